use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;

use super::{Children, Element};
use crate::vint::VarInt;
use crate::{ErrorKind, Result};

/// How the data of an element is interpreted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueKind {
    /// Child elements.
    Master,

    /// Big-endian unsigned integer.
    Uint,

    /// Big-endian signed integer.
    Int,

    /// IEEE 754 float of 0, 4 or 8 bytes.
    Float,

    /// UTF-8 text, optionally NUL padded.
    Utf8,

    /// Opaque bytes.
    Bytes,

    /// A nested variable-length integer.
    VarInt,

    /// Nanoseconds since 2001-01-01T00:00:00 UTC as a signed integer.
    Date,

    /// A (Simple)Block.
    Block,

    /// Padding.
    Void,

    /// CRC-32 of the sibling elements.
    Crc32,

    /// Unsigned integer restricted to a closed set of named codes.
    Enum(&'static [(u64, &'static str)]),

    /// An element this crate does not know.
    Unknown,
}

/// Static description of an element type.
pub struct ElementSpec {
    /// Element id, length marker included.
    pub id: u64,

    /// Display name.
    pub name: &'static str,

    /// Nesting level (the root elements are at level 0).
    ///
    /// `None` means that the element may appear at any level.
    pub level: Option<u32>,

    /// How the data is interpreted.
    pub value: ValueKind,

    /// Whether the element may occur more than once in its parent.
    pub multiple: bool,

    /// Known child element types.
    pub children: &'static [&'static ElementSpec],
}
impl ElementSpec {
    /// Returns `true` if the element has no children.
    pub fn is_leaf(&self) -> bool {
        self.value != ValueKind::Master
    }

    /// Returns the known child type that has the given id.
    ///
    /// Void and CRC-32 are known everywhere.
    pub fn child(&self, id: u64) -> Option<&'static ElementSpec> {
        self.children
            .iter()
            .copied()
            .find(|c| c.id == id)
            .or_else(|| [&VOID, &CRC32].iter().copied().find(|c| c.id == id))
    }
}
impl fmt::Debug for ElementSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ElementSpec({}, 0x{:X})", self.name, self.id)
    }
}

/// Padding element.
pub static VOID: ElementSpec = ElementSpec {
    id: 0xEC,
    name: "Void",
    level: None,
    value: ValueKind::Void,
    multiple: true,
    children: &[],
};

/// Checksum element.
pub static CRC32: ElementSpec = ElementSpec {
    id: 0xBF,
    name: "CRC-32",
    level: None,
    value: ValueKind::Crc32,
    multiple: false,
    children: &[],
};

/// Fallback for ids that are not known in their parent.
pub static UNKNOWN: ElementSpec = ElementSpec {
    id: 0,
    name: "Unknown",
    level: None,
    value: ValueKind::Unknown,
    multiple: true,
    children: &[],
};

/// A statically typed element.
pub trait ElementType: Sized {
    /// Returns the descriptor of the type.
    fn spec() -> &'static ElementSpec;

    /// Wraps an already validated element.
    fn from_schema(inner: SchemaElement) -> Self;

    /// Returns the untyped view of the element.
    fn schema(&self) -> &SchemaElement;

    /// Validates `element` against the type and wraps it.
    fn from_element(element: Element, parent: Option<&SchemaElement>) -> Result<Self> {
        let inner = track!(SchemaElement::new(Self::spec(), element, parent))?;
        Ok(Self::from_schema(inner))
    }
}

macro_rules! define_elements {
    (@multiple multiple) => { true };
    (@multiple) => { false };
    ($(
        $(#[$attr:meta])*
        $name:ident($spec:ident $(, $multiple:ident)?) = $id:literal, $level:expr,
            $kind:ident $(($table:expr))? $([$($child:ident),* $(,)?])?;
    )*) => {$(
        #[doc = concat!("Descriptor of [`", stringify!($name), "`].")]
        pub static $spec: $crate::ebml::ElementSpec = $crate::ebml::ElementSpec {
            id: $id,
            name: stringify!($name),
            level: $level,
            value: $crate::ebml::ValueKind::$kind $(($table))?,
            multiple: define_elements!(@multiple $($multiple)?),
            children: &[$($(&$child),*)?],
        };

        $(#[$attr])*
        #[derive(Debug, Clone)]
        pub struct $name($crate::ebml::SchemaElement);
        impl $crate::ebml::ElementType for $name {
            fn spec() -> &'static $crate::ebml::ElementSpec {
                &$spec
            }
            fn from_schema(inner: $crate::ebml::SchemaElement) -> Self {
                $name(inner)
            }
            fn schema(&self) -> &$crate::ebml::SchemaElement {
                &self.0
            }
        }
        impl ::std::ops::Deref for $name {
            type Target = $crate::ebml::SchemaElement;
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    )*};
}
pub(crate) use define_elements;

/// An element paired with its static description.
#[derive(Debug, Clone)]
pub struct SchemaElement {
    spec: &'static ElementSpec,
    element: Element,
}
impl SchemaElement {
    /// Makes a new `SchemaElement` after checking the id and the nesting level.
    ///
    /// The level of `spec` must be the level of `parent` plus one.
    pub fn new(
        spec: &'static ElementSpec,
        element: Element,
        parent: Option<&SchemaElement>,
    ) -> Result<Self> {
        if !std::ptr::eq(spec, &UNKNOWN) {
            track_assert_eq!(
                element.id().id(),
                spec.id,
                ErrorKind::SchemaViolation,
                "Unexpected id for {}",
                spec.name
            );
        }
        if let (Some(parent), Some(level)) = (parent, spec.level) {
            track_assert!(
                parent.spec.level.map(|l| l + 1) == Some(level),
                ErrorKind::SchemaViolation,
                "{} (level {}) cannot be a child of {} (level {:?})",
                spec.name,
                level,
                parent.spec.name,
                parent.spec.level
            );
        }
        Ok(SchemaElement { spec, element })
    }

    /// Wraps a child element of this one, using the known child table.
    pub fn child(&self, element: Element) -> Result<SchemaElement> {
        let spec = self.spec.child(element.id().id()).unwrap_or(&UNKNOWN);
        track!(SchemaElement::new(spec, element, Some(self)))
    }

    /// Returns the static description.
    pub fn spec(&self) -> &'static ElementSpec {
        self.spec
    }

    /// Returns the underlying element.
    pub fn element(&self) -> &Element {
        &self.element
    }

    /// Returns the raw id.
    pub fn id(&self) -> u64 {
        self.element.id().id()
    }

    /// Returns the display name.
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    /// Returns the nesting level (`None` for any-level elements).
    pub fn level(&self) -> Option<u32> {
        self.spec.level
    }

    /// Returns `true` if the element has no children.
    pub fn is_leaf(&self) -> bool {
        self.spec.is_leaf()
    }

    /// Returns `true` if the element may occur more than once in its parent.
    pub fn is_multiple(&self) -> bool {
        self.spec.multiple
    }

    /// Returns the children, typed by the known child table.
    pub fn children(&self) -> Result<SchemaChildren> {
        track_assert!(
            !self.is_leaf(),
            ErrorKind::InvalidInput,
            "{} has no children",
            self.name()
        );
        Ok(SchemaChildren {
            parent: self.clone(),
            children: self.element.children(),
        })
    }

    /// Starts a query for children of type `T`.
    pub fn query<T: ElementType>(&self) -> Query<T> {
        Query {
            parent: self.clone(),
            before: None,
            _type: PhantomData,
        }
    }

    /// Returns the first child of type `T`, failing with `ElementNotFound` if there is none.
    pub fn one<T: ElementType>(&self) -> Result<T> {
        track!(self.query::<T>().one())
    }

    /// Returns the first child of type `T`, if any.
    pub fn maybe_one<T: ElementType>(&self) -> Result<Option<T>> {
        track!(self.query::<T>().maybe_one())
    }

    /// Returns the children of type `T`.
    pub fn many<T: ElementType>(&self) -> Result<Many<T>> {
        track!(self.query::<T>().many())
    }

    /// Reads the data as a big-endian unsigned integer.
    pub fn read_uint(&self) -> Result<u64> {
        let data = track!(self.read_small(8))?;
        Ok(data.iter().fold(0, |acc, &b| (acc << 8) | u64::from(b)))
    }

    /// Reads the data as a big-endian signed integer.
    pub fn read_int(&self) -> Result<i64> {
        let data = track!(self.read_small(8))?;
        if data.is_empty() {
            return Ok(0);
        }
        let unsigned = data.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
        let shift = 64 - 8 * data.len() as u32;
        Ok(((unsigned << shift) as i64) >> shift)
    }

    /// Reads the data as a float.
    pub fn read_float(&self) -> Result<f64> {
        let data = track!(self.read_small(8))?;
        match data.len() {
            0 => Ok(0.0),
            4 => Ok(f64::from(f32::from_bits(u32::from_be_bytes([
                data[0], data[1], data[2], data[3],
            ])))),
            8 => {
                let mut bytes = [0; 8];
                bytes.copy_from_slice(&data);
                Ok(f64::from_bits(u64::from_be_bytes(bytes)))
            }
            n => track_panic!(ErrorKind::InvalidInput, "{}: invalid float size {}", self.name(), n),
        }
    }

    /// Reads the data as text, ignoring NUL padding.
    pub fn read_utf8(&self) -> Result<String> {
        let mut data = track!(self.element.read())?;
        if let Some(end) = data.iter().position(|&b| b == 0) {
            data.truncate(end);
        }
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Reads the raw data.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        track!(self.element.read())
    }

    /// Reads the data as a nested variable-length integer.
    pub fn read_varint(&self) -> Result<VarInt> {
        let data = track!(self.read_small(8))?;
        track!(VarInt::from_bytes(&data))
    }

    /// Reads the data as an enumeration code and returns its name.
    pub fn read_enum(&self) -> Result<&'static str> {
        let code = track!(self.read_uint())?;
        let ValueKind::Enum(table) = self.spec.value else {
            track_panic!(ErrorKind::InvalidInput, "{} is not an enumeration", self.name());
        };
        let name = table.iter().find(|&&(c, _)| c == code).map(|&(_, n)| n);
        let name = track_assert_some!(
            name,
            ErrorKind::InvalidInput,
            "{}: unknown code {}",
            self.name(),
            code
        );
        Ok(name)
    }

    fn read_small(&self, max: u64) -> Result<Vec<u8>> {
        let size = self.element.data().len();
        track_assert!(
            size <= max,
            ErrorKind::InvalidInput,
            "{}: {} bytes is too large for its value type",
            self.name(),
            size
        );
        track!(self.element.read())
    }
}
impl Deref for SchemaElement {
    type Target = Element;
    fn deref(&self) -> &Element {
        &self.element
    }
}

/// Children of a `SchemaElement`, each wrapped by its known type
/// (or `UNKNOWN` if the parent does not know the id).
#[derive(Debug)]
pub struct SchemaChildren {
    parent: SchemaElement,
    children: Children,
}
impl Iterator for SchemaChildren {
    type Item = Result<SchemaElement>;

    fn next(&mut self) -> Option<Self::Item> {
        let element = match self.children.next()? {
            Ok(element) => element,
            Err(e) => return Some(Err(track!(e))),
        };
        Some(track!(self.parent.child(element)))
    }
}

/// A search for children of type `T`.
#[derive(Debug)]
pub struct Query<T> {
    parent: SchemaElement,
    before: Option<u64>,
    _type: PhantomData<fn() -> T>,
}
impl<T: ElementType> Query<T> {
    /// Stops the search at the first child of type `B`.
    pub fn before<B: ElementType>(mut self) -> Self {
        self.before = Some(B::spec().id);
        self
    }

    /// Returns the first match, failing with `ElementNotFound` if there is none.
    pub fn one(&self) -> Result<T> {
        let found = track!(self.maybe_one())?;
        let found = track_assert_some!(
            found,
            ErrorKind::ElementNotFound,
            "No {} in {}",
            T::spec().name,
            self.parent.name()
        );
        Ok(found)
    }

    /// Returns the first match, if any.
    pub fn maybe_one(&self) -> Result<Option<T>> {
        let mut many = track!(self.many())?;
        many.next().transpose()
    }

    /// Returns every match as a lazy sequence.
    pub fn many(&self) -> Result<Many<T>> {
        track_assert!(
            !self.parent.is_leaf(),
            ErrorKind::InvalidInput,
            "{} has no children",
            self.parent.name()
        );
        Ok(Many {
            parent: self.parent.clone(),
            children: self.parent.element().children(),
            before: self.before,
            done: false,
            _type: PhantomData,
        })
    }
}

/// Lazy sequence of the children of type `T`.
#[derive(Debug)]
pub struct Many<T> {
    parent: SchemaElement,
    children: Children,
    before: Option<u64>,
    done: bool,
    _type: PhantomData<fn() -> T>,
}
impl<T: ElementType> Iterator for Many<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let element = match self.children.next()? {
                Ok(element) => element,
                Err(e) => return Some(Err(track!(e))),
            };
            let id = element.id().id();
            if Some(id) == self.before {
                self.done = true;
                return None;
            }
            if id == T::spec().id {
                return Some(track!(T::from_element(element, Some(&self.parent))));
            }
        }
    }
}
