use dispatch_executor::{QueueAttr, QueueAttrBuilder};

/// Configuration of the dispatch thread behind a [`RequestQueue`][crate::RequestQueue].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueConfig {
    label: String,
    stack_size: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            label: String::from("blerequest-dispatch"),
            stack_size: None,
        }
    }
}

impl QueueConfig {
    /// A configuration whose dispatch thread is named `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            stack_size: None,
        }
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn to_attr(&self) -> Option<QueueAttr> {
        let builder = QueueAttrBuilder::serial();
        match self.stack_size {
            Some(stack_size) => builder.with_stack_size(stack_size).build(),
            None => builder.build(),
        }
    }
}
