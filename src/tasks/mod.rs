//! Built-in task families

pub mod cpp;

pub use cpp::{BUILD_PROJECT, CPP_EXAMPLE};

use crate::collect::TaskRegistry;

/// Registry holding every built-in family
pub fn default_registry() -> TaskRegistry {
    TaskRegistry::new().with(cpp::exporter())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_families() {
        assert_eq!(default_registry().families(), vec![CPP_EXAMPLE]);
    }
}
