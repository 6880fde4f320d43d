//! Typed views of MSR values

/// A register whose raw value is built from named fields
///
/// Encoding lives in one place per layout, so a unit mask can never land in
/// the event-code byte by accident.
pub trait RegisterLayout: Sized {
    fn to_msr_value(&self) -> u64;

    fn from_msr_value(value: u64) -> Self;

    /// Flag field combinations that are legal to write but probably not
    /// what the caller meant. Writers decide whether to refuse or only warn.
    fn validate(&self) -> Result<(), &'static str> {
        Ok(())
    }
}
