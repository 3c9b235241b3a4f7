//! Target schema descriptors and the resolver seam
//!
//! The mapping engine consumes the output schema through [`SchemaResolver`]:
//! given a parent complex type and a step name, it hands back the declared
//! child descriptor (optionally with a polymorphic type override). An
//! in-memory [`Schema`] built via [`SchemaBuilder`] is provided for
//! embedders and tests; XSD-backed resolvers can implement the same trait.

use crate::path::QName;
use std::sync::Arc;

/// Kind of node a descriptor declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// Root output instance kind; carries an identifier
    Feature,
    /// Nested container with child attributes; may carry an identifier
    Complex,
    /// Leaf value
    Scalar,
}

/// Upper multiplicity bound of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurs {
    /// At most one instance
    One,
    /// At most `n` instances
    Bounded(usize),
    /// Unbounded repetition
    Unbounded,
}

impl Occurs {
    /// True when more than one sibling instance is allowed
    pub fn allows_many(&self) -> bool {
        !matches!(self, Occurs::One)
    }
}

/// Declaration of one attribute within a complex type
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescriptor {
    /// Attribute name
    pub name: QName,
    /// Node kind
    pub kind: AttributeKind,
    /// Name of the complex type (or scalar type tag) of the content
    pub type_name: Option<QName>,
    /// Upper multiplicity bound
    pub max_occurs: Occurs,
}

impl AttributeDescriptor {
    /// True for feature and complex kinds (nodes that hold children and ids)
    pub fn is_complex(&self) -> bool {
        matches!(self.kind, AttributeKind::Feature | AttributeKind::Complex)
    }
}

/// A named complex type with its declared children
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexType {
    /// Type name
    pub name: QName,
    /// Child declarations in schema order
    pub children: Vec<Arc<AttributeDescriptor>>,
}

impl ComplexType {
    /// Look up a child declaration by name
    pub fn child(&self, name: &QName) -> Option<&Arc<AttributeDescriptor>> {
        self.children.iter().find(|d| &d.name == name)
    }
}

/// Resolver seam between the mapping engine and the schema system
pub trait SchemaResolver {
    /// Look up a complex type by name
    fn complex_type(&self, name: &QName) -> Option<Arc<ComplexType>>;

    /// Declared child descriptor of `parent` for a step name
    fn descriptor_for(
        &self,
        parent: &ComplexType,
        name: &QName,
    ) -> Option<Arc<AttributeDescriptor>> {
        parent.child(name).cloned()
    }

    /// Child descriptor with a polymorphic type override (used when a
    /// mapping substitutes a more specific type at that position)
    fn descriptor_for_with_type(
        &self,
        parent: &ComplexType,
        name: &QName,
        explicit: &QName,
    ) -> Option<Arc<AttributeDescriptor>> {
        let base = self.descriptor_for(parent, name)?;
        self.complex_type(explicit)?;
        Some(Arc::new(AttributeDescriptor {
            type_name: Some(explicit.clone()),
            ..(*base).clone()
        }))
    }

    /// Complex type backing a descriptor's content, if any
    fn type_of(&self, descriptor: &AttributeDescriptor) -> Option<Arc<ComplexType>> {
        descriptor
            .type_name
            .as_ref()
            .and_then(|name| self.complex_type(name))
    }
}

/// In-memory schema: a set of named complex types
#[derive(Debug, Clone, Default)]
pub struct Schema {
    types: rustc_hash::FxHashMap<QName, Arc<ComplexType>>,
}

impl SchemaResolver for Schema {
    fn complex_type(&self, name: &QName) -> Option<Arc<ComplexType>> {
        self.types.get(name).cloned()
    }
}

/// Fluent builder for [`Schema`]
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    types: Vec<ComplexTypeBuilder>,
}

impl SchemaBuilder {
    /// Start an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a complex type
    pub fn register(mut self, builder: ComplexTypeBuilder) -> Self {
        self.types.push(builder);
        self
    }

    /// Finish the schema. Type references are resolved by name at lookup
    /// time, so mutually recursive types are fine.
    pub fn build(self) -> Schema {
        let mut types = rustc_hash::FxHashMap::default();
        for builder in self.types {
            let ty = Arc::new(ComplexType {
                name: builder.name.clone(),
                children: builder.children,
            });
            types.insert(builder.name, ty);
        }
        Schema { types }
    }
}

/// Fluent builder for one [`ComplexType`]
#[derive(Debug)]
pub struct ComplexTypeBuilder {
    name: QName,
    children: Vec<Arc<AttributeDescriptor>>,
}

impl ComplexTypeBuilder {
    /// Start a complex type with the given name
    pub fn new(name: impl Into<QName>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Declare a single-occurrence scalar child
    pub fn scalar(self, name: impl Into<QName>) -> Self {
        self.attribute(AttributeDescriptor {
            name: name.into(),
            kind: AttributeKind::Scalar,
            type_name: None,
            max_occurs: Occurs::One,
        })
    }

    /// Declare a single-occurrence complex child of the named type
    pub fn complex(self, name: impl Into<QName>, type_name: impl Into<QName>) -> Self {
        self.attribute(AttributeDescriptor {
            name: name.into(),
            kind: AttributeKind::Complex,
            type_name: Some(type_name.into()),
            max_occurs: Occurs::One,
        })
    }

    /// Declare an unbounded repeated complex child of the named type
    pub fn complex_many(self, name: impl Into<QName>, type_name: impl Into<QName>) -> Self {
        self.attribute(AttributeDescriptor {
            name: name.into(),
            kind: AttributeKind::Complex,
            type_name: Some(type_name.into()),
            max_occurs: Occurs::Unbounded,
        })
    }

    /// Declare a child from a full descriptor
    pub fn attribute(mut self, descriptor: AttributeDescriptor) -> Self {
        self.children.push(Arc::new(descriptor));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        SchemaBuilder::new()
            .register(
                ComplexTypeBuilder::new("StationType")
                    .scalar("name")
                    .complex_many("measurement", "MeasurementType"),
            )
            .register(
                ComplexTypeBuilder::new("MeasurementType")
                    .scalar("result")
                    .scalar("unit"),
            )
            .build()
    }

    #[test]
    fn test_descriptor_lookup() {
        let schema = schema();
        let station = schema.complex_type(&QName::local("StationType")).unwrap();
        let d = schema
            .descriptor_for(&station, &QName::local("measurement"))
            .unwrap();
        assert!(d.is_complex());
        assert!(d.max_occurs.allows_many());
        assert!(
            schema
                .descriptor_for(&station, &QName::local("missing"))
                .is_none()
        );
    }

    #[test]
    fn test_polymorphic_override() {
        let schema = SchemaBuilder::new()
            .register(
                ComplexTypeBuilder::new("RootType").complex("specification", "BaseType"),
            )
            .register(ComplexTypeBuilder::new("BaseType").scalar("a"))
            .register(ComplexTypeBuilder::new("DerivedType").scalar("a"))
            .build();
        let root = schema.complex_type(&QName::local("RootType")).unwrap();
        let d = schema
            .descriptor_for_with_type(
                &root,
                &QName::local("specification"),
                &QName::local("DerivedType"),
            )
            .unwrap();
        assert_eq!(d.type_name, Some(QName::local("DerivedType")));
        // Unknown override type is a mismatch, not a silent fallback
        assert!(
            schema
                .descriptor_for_with_type(
                    &root,
                    &QName::local("specification"),
                    &QName::local("NoSuchType"),
                )
                .is_none()
        );
    }

    #[test]
    fn test_type_of_follows_reference() {
        let schema = schema();
        let station = schema.complex_type(&QName::local("StationType")).unwrap();
        let d = schema
            .descriptor_for(&station, &QName::local("measurement"))
            .unwrap();
        assert_eq!(
            schema.type_of(&d).unwrap().name,
            QName::local("MeasurementType")
        );
    }
}
