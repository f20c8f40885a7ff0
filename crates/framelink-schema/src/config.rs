/// Configuration applied when schemas are registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaConfig {
    /// Close object schemas against undeclared properties
    /// (`additionalProperties: false` wherever the schema author left it
    /// unspecified), recursively.
    pub strict_mode: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self { strict_mode: false }
    }
}
