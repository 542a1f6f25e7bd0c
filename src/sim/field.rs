use tracing::info;

use crate::Vector;

/// Magnetic field with the same value everywhere, in tesla.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformField {
    value: Vector,
}

impl UniformField {
    pub fn value(&self) -> Vector {
        self.value
    }
}

/// Global field of a run. Owned by the run context and dropped with it.
#[derive(Debug, Clone, Default)]
pub struct FieldSetup {
    field: Option<UniformField>,
}

impl FieldSetup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the global field. A zero value removes it.
    pub fn register(&mut self, value: Vector) {
        if value.is_zero() {
            if self.field.take().is_some() {
                info!("Magnetic field is switched off");
            }
            return;
        }
        info!("Magnetic field set to {value:.4} T");
        self.field = Some(UniformField { value });
    }

    pub fn field(&self) -> Option<&UniformField> {
        self.field.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.field.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_field_not_created() {
        let mut setup = FieldSetup::new();
        setup.register(Vector::zero());
        assert!(!setup.is_active());
    }

    #[test]
    fn test_field_replaced_and_removed() {
        let mut setup = FieldSetup::new();
        setup.register(Vector::new(0., 0., 1.5));
        assert_eq!(setup.field().map(|f| f.value().dz), Some(1.5));
        setup.register(Vector::zero());
        assert!(setup.field().is_none());
    }
}
