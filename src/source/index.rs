use std::collections::{BTreeMap, BTreeSet};

/// One enum variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantDecl {
    pub name: String,
    /// `true` for a fieldless variant
    pub unit: bool,
}

/// One named struct field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: String,
    /// Single-segment type names inside `ty`
    pub referenced_types: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeShape {
    Enum(Vec<VariantDecl>),
    Struct(Vec<FieldDecl>),
    /// Tuple structs, unit structs and type aliases
    Opaque,
}

/// A type declaration found while scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub name: String,
    pub module_path: String,
    pub shape: TypeShape,
}

impl TypeDecl {
    pub fn import_path(&self) -> String {
        format!("{}::{}", self.module_path, self.name)
    }
}

/// Type declarations of the whole scanned tree, by simple name
///
/// When two modules declare the same name the first one scanned is kept; the
/// collision is logged since cross-references by simple name become ambiguous.
#[derive(Debug, Clone, Default)]
pub struct TypeIndex {
    types: BTreeMap<String, TypeDecl>,
}

impl TypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, decl: TypeDecl) {
        if let Some(existing) = self.types.get(&decl.name) {
            if existing.module_path != decl.module_path {
                tracing::warn!(
                    name = %decl.name,
                    kept = %existing.module_path,
                    ignored = %decl.module_path,
                    "type declared in more than one module"
                );
            }
            return;
        }
        self.types.insert(decl.name.clone(), decl);
    }

    pub fn extend(&mut self, decls: impl IntoIterator<Item = TypeDecl>) {
        for decl in decls {
            self.insert(decl);
        }
    }

    pub fn get(&self, name: &str) -> Option<&TypeDecl> {
        self.types.get(name)
    }

    /// Variants of an indexed enum
    pub fn enum_variants(&self, name: &str) -> Option<&[VariantDecl]> {
        match &self.get(name)?.shape {
            TypeShape::Enum(variants) => Some(variants),
            _ => None,
        }
    }

    /// Fields of an indexed struct with named fields
    pub fn struct_fields(&self, name: &str) -> Option<&[FieldDecl]> {
        match &self.get(name)?.shape {
            TypeShape::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
