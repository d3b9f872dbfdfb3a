/// Structured tracing span names and field keys.
///
/// Spans follow the hierarchy:
///
/// ```text
/// polysearch.dispatch
///   └─> polysearch.provider.call (one per selected provider)
/// polysearch.registry.register
///   └─> polysearch.validate
/// polysearch.detect
/// ```
///
/// Queries are recorded only as trace events, never as span fields.
// Span names (hierarchical, dot-separated)
/// Root span for one dispatch.
pub const SPAN_DISPATCH: &str = "polysearch.dispatch";

/// Span for one provider-adapter call (child of dispatch).
pub const SPAN_PROVIDER_CALL: &str = "polysearch.provider.call";

/// Span for a provider registration.
pub const SPAN_REGISTER: &str = "polysearch.registry.register";

/// Span for a provider-type detection.
pub const SPAN_DETECT: &str = "polysearch.detect";

/// Span for a credential validation.
pub const SPAN_VALIDATE: &str = "polysearch.validate";

// Field keys for span attributes
/// Provider id field.
pub const FIELD_PROVIDER: &str = "provider";

/// Provider type field.
pub const FIELD_PROVIDER_TYPE: &str = "provider_type";

/// Number of selected providers.
pub const FIELD_PROVIDER_COUNT: &str = "provider_count";
