use bankreg_model::SchemaModel;
use bankreg_transform::{CleanOptions, RuleSet};

/// Everything a batch run reads besides its records.
#[derive(Debug, Clone, Copy)]
pub struct BatchContext<'a> {
    pub batch_id: &'a str,
    pub rules: &'a RuleSet,
    pub schema: &'a SchemaModel,
    pub options: CleanOptions,
}

impl<'a> BatchContext<'a> {
    /// Context using the rule set's own options.
    pub fn new(batch_id: &'a str, rules: &'a RuleSet, schema: &'a SchemaModel) -> Self {
        Self {
            batch_id,
            rules,
            schema,
            options: rules.options(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: CleanOptions) -> Self {
        self.options = options;
        self
    }
}
