//! Record type descriptors.
//!
//! A record type describes its persisted shape once, through
//! [`RealmObject::schema`]. There is no runtime introspection: the
//! descriptor is the schema.

use embra_storage::{ColumnType, Value};

/// A Rust type that maps onto a column type.
pub trait ColumnValue: Sized {
    /// The column type used to persist this Rust type.
    const COLUMN_TYPE: ColumnType;

    /// Extracts this type from a stored value.
    fn from_value(value: Value) -> Option<Self>;
}

impl ColumnValue for bool {
    const COLUMN_TYPE: ColumnType = ColumnType::Bool;

    fn from_value(value: Value) -> Option<Self> {
        value.as_bool()
    }
}

impl ColumnValue for i64 {
    const COLUMN_TYPE: ColumnType = ColumnType::Int;

    fn from_value(value: Value) -> Option<Self> {
        value.as_int()
    }
}

impl ColumnValue for i32 {
    const COLUMN_TYPE: ColumnType = ColumnType::Int;

    fn from_value(value: Value) -> Option<Self> {
        value.as_int().and_then(|v| i32::try_from(v).ok())
    }
}

impl ColumnValue for f64 {
    const COLUMN_TYPE: ColumnType = ColumnType::Double;

    fn from_value(value: Value) -> Option<Self> {
        value.as_double()
    }
}

impl ColumnValue for String {
    const COLUMN_TYPE: ColumnType = ColumnType::String;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl ColumnValue for Vec<u8> {
    const COLUMN_TYPE: ColumnType = ColumnType::Binary;

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }
}

/// One declared field of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: String,
    column_type: ColumnType,
    ignored: bool,
    mapped_to: Option<String>,
}

impl FieldDescriptor {
    /// Declares a field with an explicit column type.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            ignored: false,
            mapped_to: None,
        }
    }

    /// Declares a field whose column type follows from the Rust type `T`.
    pub fn of<T: ColumnValue>(name: impl Into<String>) -> Self {
        Self::new(name, T::COLUMN_TYPE)
    }

    /// Marks the field as not persisted.
    #[must_use]
    pub fn ignore(mut self) -> Self {
        self.ignored = true;
        self
    }

    /// Persists the field under a different column name.
    #[must_use]
    pub fn map_to(mut self, column: impl Into<String>) -> Self {
        self.mapped_to = Some(column.into());
        self
    }

    /// Returns the declared field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column type.
    #[must_use]
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Checks whether the field is excluded from persistence.
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    /// Returns the column name the field is stored under.
    #[must_use]
    pub fn persisted_name(&self) -> &str {
        self.mapped_to.as_deref().unwrap_or(&self.name)
    }
}

/// The persisted shape of a record type: table name plus ordered fields.
///
/// # Example
///
/// ```rust
/// use embra_core::{FieldDescriptor, ObjectSchema};
///
/// let schema = ObjectSchema::new("Person")
///     .with_generated_accessors()
///     .field(FieldDescriptor::of::<String>("name"))
///     .field(FieldDescriptor::of::<String>("email").map_to("mail"))
///     .field(FieldDescriptor::of::<i64>("cache").ignore());
///
/// let columns: Vec<_> = schema.persisted_fields().map(|f| f.persisted_name()).collect();
/// assert_eq!(columns, ["name", "mail"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSchema {
    name: String,
    accessors_generated: bool,
    fields: Vec<FieldDescriptor>,
}

impl ObjectSchema {
    /// Starts a schema for the type named `name`; the table shares the name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            accessors_generated: false,
            fields: Vec::new(),
        }
    }

    /// Marks the type's accessors as generated to route through row storage.
    #[must_use]
    pub fn with_generated_accessors(mut self) -> Self {
        self.accessors_generated = true;
        self
    }

    /// Appends a field. Declaration order is column order.
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Returns the type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the backing table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.name
    }

    /// Checks for the accessors-generated marker.
    #[must_use]
    pub fn has_generated_accessors(&self) -> bool {
        self.accessors_generated
    }

    /// Returns every declared field, ignored ones included.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Returns the fields that get a column, in declaration order.
    pub fn persisted_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.is_ignored())
    }

    /// Looks up a declared field by its field name.
    #[must_use]
    pub fn find_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// An application record type that can be stored in a database.
///
/// ```rust
/// use embra_core::{FieldDescriptor, ObjectSchema, RealmObject};
///
/// #[derive(Default)]
/// struct Dog {
///     name: String,
/// }
///
/// impl RealmObject for Dog {
///     fn schema() -> ObjectSchema {
///         ObjectSchema::new("Dog")
///             .with_generated_accessors()
///             .field(FieldDescriptor::of::<String>("name"))
///     }
/// }
/// ```
pub trait RealmObject: Default + 'static {
    /// Describes the type's table and columns. Called once per type and database.
    fn schema() -> ObjectSchema;
}
