use dashmap::{mapref::entry::Entry, DashMap};
use std::collections::HashSet;

/// Per-account registry of the device identifiers currently holding a
/// session.
///
/// Sole source of truth for "is this device still logged in", not a cache
/// of anything persisted elsewhere. State is process-local and resets on
/// restart, which is an accepted limitation of the deployment. Every
/// operation mutates one account's set under that key's shard lock, so
/// concurrent calls for the same account cannot corrupt the set.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: DashMap<String, HashSet<String>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device to the account's set. Idempotent: re-registering an
    /// already-registered device is a no-op success. Registration always
    /// succeeds; the concurrent-device ceiling is surfaced by `count`, not
    /// enforced here.
    pub fn register(&self, email: &str, device_id: &str) {
        self.devices
            .entry(email.to_string())
            .or_default()
            .insert(device_id.to_string());
    }

    /// Current device-set size and whether it exceeds one device. A missing
    /// entry and an empty set both mean "no active devices".
    pub fn count(&self, email: &str) -> (usize, bool) {
        let count = self.devices.get(email).map(|set| set.len()).unwrap_or(0);
        (count, count > 1)
    }

    /// The account's device ids, sorted for stable responses.
    pub fn list(&self, email: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .devices
            .get(email)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Atomically replace the account's set with `{current_device_id}`,
    /// returning the removed ids for audit logging. The current device ends
    /// up registered even if it was not before.
    pub fn logout_others(&self, email: &str, current_device_id: &str) -> Vec<String> {
        match self.devices.entry(email.to_string()) {
            Entry::Occupied(mut entry) => {
                let set = entry.get_mut();
                let mut removed: Vec<String> = set
                    .iter()
                    .filter(|id| id.as_str() != current_device_id)
                    .cloned()
                    .collect();
                set.clear();
                set.insert(current_device_id.to_string());
                removed.sort();
                removed
            }
            Entry::Vacant(entry) => {
                entry.insert(HashSet::from([current_device_id.to_string()]));
                Vec::new()
            }
        }
    }

    /// Remove exactly that device id. Returns false when it was not present,
    /// so callers can distinguish 404 from 200.
    pub fn revoke(&self, email: &str, device_id: &str) -> bool {
        match self.devices.entry(email.to_string()) {
            Entry::Occupied(mut entry) => {
                let removed = entry.get_mut().remove(device_id);
                if entry.get().is_empty() {
                    entry.remove();
                }
                removed
            }
            Entry::Vacant(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_has_set_semantics() {
        let registry = DeviceRegistry::new();
        registry.register("stu@org.edu", "dev-1");
        registry.register("stu@org.edu", "dev-1");
        assert_eq!(registry.count("stu@org.edu"), (1, false));

        registry.register("stu@org.edu", "dev-2");
        assert_eq!(registry.count("stu@org.edu"), (2, true));
    }

    #[test]
    fn missing_account_means_no_devices() {
        let registry = DeviceRegistry::new();
        assert_eq!(registry.count("nobody@org.edu"), (0, false));
        assert!(registry.list("nobody@org.edu").is_empty());
    }

    #[test]
    fn logout_others_keeps_only_the_current_device() {
        let registry = DeviceRegistry::new();
        for id in ["A", "B", "C"] {
            registry.register("stu@org.edu", id);
        }
        let removed = registry.logout_others("stu@org.edu", "B");
        assert_eq!(removed, vec!["A".to_string(), "C".to_string()]);
        assert_eq!(registry.list("stu@org.edu"), vec!["B".to_string()]);
    }

    #[test]
    fn logout_others_on_fresh_account_pins_current_device() {
        let registry = DeviceRegistry::new();
        let removed = registry.logout_others("stu@org.edu", "dev-1");
        assert!(removed.is_empty());
        assert_eq!(registry.count("stu@org.edu"), (1, false));
    }

    #[test]
    fn revoke_distinguishes_absence() {
        let registry = DeviceRegistry::new();
        registry.register("stu@org.edu", "dev-1");

        assert!(!registry.revoke("stu@org.edu", "dev-9"));
        assert!(registry.revoke("stu@org.edu", "dev-1"));
        assert!(!registry.revoke("stu@org.edu", "dev-1"));
        // Empty sets are dropped entirely.
        assert_eq!(registry.count("stu@org.edu"), (0, false));
    }

    #[test]
    fn concurrent_register_and_logout_others_never_corrupt_the_set() {
        use std::sync::Arc;

        for _ in 0..50 {
            let registry = Arc::new(DeviceRegistry::new());
            for id in ["A", "B", "C"] {
                registry.register("stu@org.edu", id);
            }

            let r1 = Arc::clone(&registry);
            let logout = std::thread::spawn(move || r1.logout_others("stu@org.edu", "B"));
            let r2 = Arc::clone(&registry);
            let register = std::thread::spawn(move || r2.register("stu@org.edu", "D"));

            let removed = logout.join().unwrap();
            register.join().unwrap();

            // D either survived (registered after the wipe) or was removed
            // with the others; the set is never missing B or duplicated.
            let devices = registry.list("stu@org.edu");
            assert!(devices.contains(&"B".to_string()));
            assert!(devices.len() <= 2);
            for id in ["A", "C"] {
                assert!(removed.contains(&id.to_string()));
                assert!(!devices.contains(&id.to_string()));
            }
        }
    }
}
