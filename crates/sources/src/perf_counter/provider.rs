//! Counter providers
//!
//! A provider answers "what is the current value of counter X of category
//! Y for instance Z". The shipped provider reads host statistics through
//! `sysinfo`:
//!
//! | Category    | Counters                                              | Instances            |
//! |-------------|-------------------------------------------------------|----------------------|
//! | `processor` | `% Processor Time`                                    | cpu names, `_Total`  |
//! | `memory`    | `Available Bytes`, `Used Bytes`, `Free Bytes`, `Total Bytes` | none          |
//! | `network`   | `Bytes Received`, `Bytes Sent`                        | interface names      |
//! | `system`    | `Load Average 1`, `Load Average 5`, `Load Average 15` | none                 |
//!
//! Names are matched case-insensitively. Single-instance categories use
//! the empty instance name.

use sysinfo::{Networks, System};

/// Instance name of the processor aggregate
pub const TOTAL_INSTANCE: &str = "_Total";

/// Source of performance counter values
pub trait CounterProvider: Send + Sync {
    /// Take a fresh reading; called once per read cycle
    fn refresh(&mut self);

    /// Instances of a category, empty for single-instance categories
    fn instances(&mut self, category: &str) -> Vec<String>;

    /// Value from the latest reading, `None` if the counter or instance
    /// does not exist
    fn value(&self, category: &str, counter: &str, instance: &str) -> Option<f64>;
}

/// Host statistics provider backed by `sysinfo`
pub struct SysinfoProvider {
    system: System,
    networks: Networks,
}

impl Default for SysinfoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoProvider {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();
        Self {
            system,
            networks: Networks::new_with_refreshed_list(),
        }
    }

    fn processor(&self, counter: &str, instance: &str) -> Option<f64> {
        if !counter.eq_ignore_ascii_case("% Processor Time") {
            return None;
        }
        if instance.eq_ignore_ascii_case(TOTAL_INSTANCE) {
            return Some(f64::from(self.system.global_cpu_info().cpu_usage()));
        }
        self.system
            .cpus()
            .iter()
            .find(|cpu| cpu.name() == instance)
            .map(|cpu| f64::from(cpu.cpu_usage()))
    }

    fn memory(&self, counter: &str) -> Option<f64> {
        let bytes = match counter.to_ascii_lowercase().as_str() {
            "available bytes" => self.system.available_memory(),
            "used bytes" => self.system.used_memory(),
            "free bytes" => self.system.free_memory(),
            "total bytes" => self.system.total_memory(),
            _ => return None,
        };
        Some(bytes as f64)
    }

    fn network(&self, counter: &str, instance: &str) -> Option<f64> {
        let (_, data) = self.networks.iter().find(|(name, _)| name.as_str() == instance)?;
        match counter.to_ascii_lowercase().as_str() {
            "bytes received" => Some(data.total_received() as f64),
            "bytes sent" => Some(data.total_transmitted() as f64),
            _ => None,
        }
    }

    fn system(&self, counter: &str) -> Option<f64> {
        let load = System::load_average();
        match counter.to_ascii_lowercase().as_str() {
            "load average 1" => Some(load.one),
            "load average 5" => Some(load.five),
            "load average 15" => Some(load.fifteen),
            _ => None,
        }
    }
}

impl CounterProvider for SysinfoProvider {
    fn refresh(&mut self) {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        self.networks.refresh();
    }

    fn instances(&mut self, category: &str) -> Vec<String> {
        match category.to_ascii_lowercase().as_str() {
            "processor" => {
                let mut names: Vec<String> =
                    self.system.cpus().iter().map(|cpu| cpu.name().to_string()).collect();
                names.push(TOTAL_INSTANCE.to_string());
                names
            }
            "network" => {
                self.networks.refresh_list();
                let mut names: Vec<String> = self.networks.iter().map(|(name, _)| name.clone()).collect();
                names.sort_unstable();
                names
            }
            _ => Vec::new(),
        }
    }

    fn value(&self, category: &str, counter: &str, instance: &str) -> Option<f64> {
        match category.to_ascii_lowercase().as_str() {
            "processor" => self.processor(counter, instance),
            "memory" => self.memory(counter),
            "network" => self.network(counter, instance),
            "system" => self.system(counter),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_counters_exist() {
        let mut provider = SysinfoProvider::new();
        provider.refresh();

        let total = provider.value("memory", "Total Bytes", "").unwrap();
        assert!(total > 0.0);
        assert!(provider.value("Memory", "available bytes", "").is_some());
        assert!(provider.value("memory", "Cached Bytes", "").is_none());
    }

    #[test]
    fn test_processor_total_instance() {
        let mut provider = SysinfoProvider::new();
        let instances = provider.instances("processor");
        assert_eq!(instances.last().map(String::as_str), Some(TOTAL_INSTANCE));

        provider.refresh();
        assert!(provider.value("processor", "% Processor Time", "_Total").is_some());
        assert!(provider.value("processor", "% Idle Time", "_Total").is_none());
    }

    #[test]
    fn test_unknown_category() {
        let mut provider = SysinfoProvider::new();
        assert!(provider.instances("disk").is_empty());
        assert!(provider.value("disk", "Reads", "").is_none());
    }

    #[test]
    fn test_system_load() {
        let provider = SysinfoProvider::new();
        assert!(provider.value("system", "Load Average 1", "").is_some());
    }
}
