use std::any;
use std::mem;

/// Descriptor for one encodable field of a call site.
///
/// A call site's descriptors form a flat, pre-order table: a compound
/// descriptor is followed immediately by the descriptors of its children,
/// and `total_sub_entries` says how many of the following descriptors belong
/// to it (recursively). Together with the packed bytes, the table is enough
/// to decode a record without knowing the Rust types that produced it.
///
/// `kind` says how the bytes are laid out. `element_width == 0` means the
/// element size depends on the sub-entries. For text, dynamic arrays,
/// optionals and maps `total_elements` is 0 and the count is packed inline
/// as a `u32` prefix; a fixed array of length 0 has no prefix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub param_name: &'static str,
    pub kind: TypeKind,
    pub is_integral: bool,
    pub is_signed: bool,
    pub is_floating_point: bool,
    /// Element bytes are text (UTF-8, UTF-16 or a C string).
    pub is_text: bool,
    pub element_width: usize,
    pub total_elements: usize,
    pub total_sub_entries: usize,
}

impl TypeInfo {
    /// Leaf descriptor for a single value of a primitive type.
    pub fn scalar<T: 'static>() -> Self {
        let type_name = any::type_name::<T>();
        let kind = TypeKind::Scalar;
        let is_floating_point = matches!(type_name, "f32" | "f64");
        let is_signed = is_floating_point
            || matches!(type_name, "i8" | "i16" | "i32" | "i64" | "i128" | "isize");
        Self {
            type_name,
            param_name: "",
            kind,
            is_integral: !is_floating_point,
            is_signed,
            is_floating_point,
            is_text: false,
            element_width: mem::size_of::<T>(),
            total_elements: 1,
            total_sub_entries: 0,
        }
    }

    /// Leaf descriptor for a run of text elements of type `E`.
    ///
    /// The element count is always packed inline.
    pub fn text<E: 'static>(type_name: &'static str) -> Self {
        Self {
            type_name,
            kind: TypeKind::Text,
            is_text: true,
            total_elements: 0,
            ..Self::scalar::<E>()
        }
    }

    /// Descriptor for a container whose element sizes come from its children.
    pub fn compound(type_name: &'static str, kind: TypeKind, total_elements: usize) -> Self {
        Self {
            type_name,
            kind,
            total_elements,
            ..Self::default()
        }
    }

    pub fn with_param(mut self, param_name: &'static str) -> Self {
        self.param_name = param_name;
        self
    }

    /// True when the element count is packed inline.
    pub fn is_variable_array_size(&self) -> bool {
        self.kind.has_inline_count()
    }

    /// Leaves have a fixed element width and no sub-entries.
    pub fn is_leaf(&self) -> bool {
        self.element_width != 0
    }
}

/// Layout of the bytes a descriptor covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TypeKind {
    #[default]
    Scalar,
    /// Count, then `count` elements of `element_width` bytes.
    Text,
    /// `total_elements` elements, no count.
    FixedArray,
    DynamicArray,
    /// Count of 0 or 1, then the value when present.
    Optional,
    /// Count, then alternating keys and values.
    Map,
    /// First then second, no count.
    Pair,
}

impl TypeKind {
    pub fn has_inline_count(self) -> bool {
        matches!(
            self,
            TypeKind::Text | TypeKind::DynamicArray | TypeKind::Optional | TypeKind::Map
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_flags() {
        let info = TypeInfo::scalar::<i16>();
        assert_eq!(info.element_width, 2);
        assert_eq!(info.total_elements, 1);
        assert!(info.is_integral && info.is_signed && !info.is_floating_point);

        let info = TypeInfo::scalar::<f64>();
        assert!(!info.is_integral && info.is_signed && info.is_floating_point);

        let info = TypeInfo::scalar::<u32>();
        assert!(info.is_integral && !info.is_signed);
        assert!(info.is_leaf());
        assert!(!info.is_variable_array_size());
    }

    #[test]
    fn test_text_is_variable() {
        let info = TypeInfo::text::<u8>("&str");
        assert!(info.is_text);
        assert!(info.is_variable_array_size());
        assert_eq!(info.element_width, 1);
        assert_eq!(info.type_name, "&str");
    }

    #[test]
    fn test_compound_width_is_zero() {
        let info = TypeInfo::compound("Vec<u8>", TypeKind::DynamicArray, 0).with_param("bytes");
        assert!(!info.is_leaf());
        assert!(info.is_variable_array_size());
        assert_eq!(info.param_name, "bytes");
    }

    #[test]
    fn test_empty_fixed_array_has_no_count() {
        let info = TypeInfo::compound("[String; 0]", TypeKind::FixedArray, 0);
        assert_eq!(info.total_elements, 0);
        assert!(!info.is_variable_array_size());
    }
}
