use pickbay_core::OperatorId;

/// Operator context for a request.
///
/// Derived from the `x-operator-id` header by the middleware and recorded on
/// every movement the request commits. This is identity-as-data, not
/// authentication (out of scope here).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OperatorContext {
    operator_id: OperatorId,
}

impl OperatorContext {
    pub fn new(operator_id: OperatorId) -> Self {
        Self { operator_id }
    }

    pub fn operator_id(&self) -> OperatorId {
        self.operator_id
    }
}
