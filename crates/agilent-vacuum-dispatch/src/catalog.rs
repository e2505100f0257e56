use crate::command::{CommandDescriptor, Operation};

/// A device's static table of supported windows.
///
/// Supporting a new operation means adding a row; nothing in the codec or
/// dispatcher changes.
#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    model: &'static str,
    entries: &'static [CommandDescriptor],
}

impl Catalog {
    pub const fn new(model: &'static str, entries: &'static [CommandDescriptor]) -> Self {
        Self { model, entries }
    }

    pub fn model(&self) -> &'static str {
        self.model
    }

    pub fn lookup(&self, operation: Operation) -> Option<&'static CommandDescriptor> {
        self.entries.iter().find(|entry| entry.operation == operation)
    }

    pub fn by_window(&self, window: u16) -> Option<&'static CommandDescriptor> {
        self.entries.iter().find(|entry| entry.window == window)
    }

    pub fn by_name(&self, name: &str) -> Option<&'static CommandDescriptor> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static CommandDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
