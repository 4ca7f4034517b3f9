//! Grouping entities: binary objects, source files, and classes.

use crate::item::{DynamicCost, FunctionId, PartCost, SourceId};

/// A binary object (executable or shared library) with its functions.
#[derive(Debug)]
pub struct Object {
    pub(crate) name: String,
    pub(crate) functions: Vec<FunctionId>,
    pub(crate) parts: Vec<PartCost>,
    pub(crate) dynamic: DynamicCost,
    pub(crate) cycle: Option<u32>,
}

impl Object {
    pub(crate) fn new(name: &str) -> Self {
        Object {
            name: name.to_string(),
            functions: Vec::new(),
            parts: Vec::new(),
            dynamic: DynamicCost::new(),
            cycle: None,
        }
    }

    /// Canonical name: the object's path as reported by the trace.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path-less name, which is also the human label.
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Functions filed under this object.
    #[must_use]
    pub fn functions(&self) -> &[FunctionId] {
        &self.functions
    }

    /// Fixed per-part rows.
    #[must_use]
    pub fn parts(&self) -> &[PartCost] {
        &self.parts
    }

    /// Number of the object cycle this object belongs to, if any.
    #[must_use]
    pub fn cycle(&self) -> Option<u32> {
        self.cycle
    }
}

/// A source file containing function definitions.
#[derive(Debug)]
pub struct File {
    pub(crate) name: String,
    pub(crate) dir_override: Option<String>,
    pub(crate) functions: Vec<FunctionId>,
    pub(crate) sources: Vec<SourceId>,
    pub(crate) parts: Vec<PartCost>,
    pub(crate) dynamic: DynamicCost,
    pub(crate) cycle: Option<u32>,
}

impl File {
    pub(crate) fn new(name: &str) -> Self {
        File {
            name: name.to_string(),
            dir_override: None,
            functions: Vec::new(),
            sources: Vec::new(),
            parts: Vec::new(),
            dynamic: DynamicCost::new(),
            cycle: None,
        }
    }

    /// Canonical name: the path as reported by the trace.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The basename, which is also the human label.
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Human label with the directory when one is known.
    #[must_use]
    pub fn pretty_long_name(&self) -> String {
        let dir = self.directory();
        if dir.is_empty() {
            self.short_name().to_string()
        } else {
            format!("{dir}/{}", self.short_name())
        }
    }

    /// Overrides the directory this file is looked up in.
    pub fn set_directory(&mut self, dir: &str) {
        self.dir_override = Some(dir.to_string());
    }

    /// Drops a directory override.
    pub fn reset_directory(&mut self) {
        self.dir_override = None;
    }

    /// The directory: an explicit override wins, else the path prefix of
    /// the file's own name, else empty.
    #[must_use]
    pub fn directory(&self) -> String {
        if let Some(dir) = &self.dir_override {
            return dir.clone();
        }
        match self.name.rsplit_once('/') {
            Some((dir, _)) => dir.to_string(),
            None => String::new(),
        }
    }

    /// Functions declared in this file.
    #[must_use]
    pub fn functions(&self) -> &[FunctionId] {
        &self.functions
    }

    /// Function-source holders whose lines come from this file.
    #[must_use]
    pub fn sources(&self) -> &[SourceId] {
        &self.sources
    }

    /// Fixed per-part rows.
    #[must_use]
    pub fn parts(&self) -> &[PartCost] {
        &self.parts
    }

    /// Number of the file cycle this file belongs to, if any.
    #[must_use]
    pub fn cycle(&self) -> Option<u32> {
        self.cycle
    }
}

/// A class or namespace.
///
/// A function symbol with a prefix ending in `::` is filed under that
/// prefix; symbols without one land in the synthetic `(global)` class.
#[derive(Debug)]
pub struct Class {
    pub(crate) name: String,
    pub(crate) functions: Vec<FunctionId>,
    pub(crate) parts: Vec<PartCost>,
    pub(crate) dynamic: DynamicCost,
    pub(crate) cycle: Option<u32>,
}

impl Class {
    pub(crate) fn new(name: &str) -> Self {
        Class {
            name: name.to_string(),
            functions: Vec::new(),
            parts: Vec::new(),
            dynamic: DynamicCost::new(),
            cycle: None,
        }
    }

    /// Canonical name; `(global)` for the synthetic catch-all class.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human label: the name, or `(global)` spelled out.
    #[must_use]
    pub fn pretty_name(&self) -> &str {
        &self.name
    }

    /// Member functions.
    #[must_use]
    pub fn functions(&self) -> &[FunctionId] {
        &self.functions
    }

    /// Fixed per-part rows.
    #[must_use]
    pub fn parts(&self) -> &[PartCost] {
        &self.parts
    }

    /// Number of the class cycle this class belongs to, if any.
    #[must_use]
    pub fn cycle(&self) -> Option<u32> {
        self.cycle
    }
}

/// A detected cycle among grouping entities of one kind.
///
/// Group cycles are bookkeeping records (membership and numbering); unlike
/// function cycles they do not synthesize graph nodes of their own.
#[derive(Debug)]
pub struct GroupCycle<Id> {
    pub(crate) number: u32,
    pub(crate) members: Vec<Id>,
}

impl<Id> GroupCycle<Id> {
    /// Cycle number, starting at 1 per detection run.
    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    /// The entities forming the cycle.
    #[must_use]
    pub fn members(&self) -> &[Id] {
        &self.members
    }
}
