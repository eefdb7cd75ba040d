use super::definition::FlowDefinition;
use crate::error::FlowConversionError;

/// A trait for custom editor or persistence formats that can be converted
/// into a nagare `FlowDefinition`.
///
/// This is the extension point that keeps the executor format-agnostic: the
/// persistence collaborator loads whatever shape the editor saved, and an
/// `IntoFlow` implementation provides the translation layer into the
/// canonical definition the scheduler understands.
pub trait IntoFlow {
    /// Consumes the object and converts it into a canonical flow definition.
    fn into_flow(self) -> Result<FlowDefinition, FlowConversionError>;
}

impl IntoFlow for FlowDefinition {
    fn into_flow(self) -> Result<FlowDefinition, FlowConversionError> {
        Ok(self)
    }
}
