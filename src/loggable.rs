//! Classification of logged values into a closed set of encodable kinds.
//!
//! Every type that can appear as a log argument implements [`Loggable`],
//! which supplies three things:
//!
//! * `FIXED_SIZE`: the encoded size when it does not depend on the value,
//! * `describe`: the flattened [`TypeInfo`] descriptors for the type,
//! * `encodable`: a borrowed [`Encodable`] view of a value.
//!
//! The packer never sees the Rust types. It works on [`Encodable`] alone,
//! with one `match` per operation, and reaches nested values through the
//! object-safe [`DynLoggable`], [`Elements`] and [`Entries`] traits.

use std::any;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
use std::ffi::{CStr, CString};
use std::hash::BuildHasher;
use std::mem;
use std::ops::ControlFlow;
use std::rc::Rc;
use std::sync::Arc;

use crate::type_info::{TypeInfo, TypeKind};

/// A primitive value, encoded little-endian at its natural width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(u128),
    Usize(usize),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(i128),
    Isize(isize),
    F32(f32),
    F64(f64),
    Char(char),
}

impl Scalar {
    pub const MAX_WIDTH: usize = 16;

    /// Writes the value into `out` and returns the number of bytes used.
    pub fn encode(self, out: &mut [u8; Scalar::MAX_WIDTH]) -> usize {
        fn put<const W: usize>(out: &mut [u8; Scalar::MAX_WIDTH], bytes: [u8; W]) -> usize {
            out[..W].copy_from_slice(&bytes);
            W
        }

        match self {
            Scalar::Bool(v) => put(out, [v as u8]),
            Scalar::U8(v) => put(out, v.to_le_bytes()),
            Scalar::U16(v) => put(out, v.to_le_bytes()),
            Scalar::U32(v) => put(out, v.to_le_bytes()),
            Scalar::U64(v) => put(out, v.to_le_bytes()),
            Scalar::U128(v) => put(out, v.to_le_bytes()),
            Scalar::Usize(v) => put(out, v.to_le_bytes()),
            Scalar::I8(v) => put(out, v.to_le_bytes()),
            Scalar::I16(v) => put(out, v.to_le_bytes()),
            Scalar::I32(v) => put(out, v.to_le_bytes()),
            Scalar::I64(v) => put(out, v.to_le_bytes()),
            Scalar::I128(v) => put(out, v.to_le_bytes()),
            Scalar::Isize(v) => put(out, v.to_le_bytes()),
            Scalar::F32(v) => put(out, v.to_le_bytes()),
            Scalar::F64(v) => put(out, v.to_le_bytes()),
            Scalar::Char(v) => put(out, u32::from(v).to_le_bytes()),
        }
    }

    pub fn width(self) -> usize {
        match self {
            Scalar::Bool(_) | Scalar::U8(_) | Scalar::I8(_) => 1,
            Scalar::U16(_) | Scalar::I16(_) => 2,
            Scalar::U32(_) | Scalar::I32(_) | Scalar::F32(_) | Scalar::Char(_) => 4,
            Scalar::U64(_) | Scalar::I64(_) | Scalar::F64(_) => 8,
            Scalar::U128(_) | Scalar::I128(_) => 16,
            Scalar::Usize(_) => mem::size_of::<usize>(),
            Scalar::Isize(_) => mem::size_of::<isize>(),
        }
    }
}

/// Borrowed text in one of the supported encodings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogStr<'a> {
    Utf8(&'a str),
    /// UTF-16 code units; the text ends at the first NUL, if any.
    Wide(&'a [u16]),
    /// A nullable C string. `None` packs as an empty string.
    C(Option<&'a CStr>),
}

impl LogStr<'_> {
    pub fn element_width(&self) -> usize {
        match self {
            LogStr::Utf8(_) | LogStr::C(_) => 1,
            LogStr::Wide(_) => 2,
        }
    }

    /// Number of elements before truncation.
    pub fn len(&self) -> usize {
        match self {
            LogStr::Utf8(s) => s.len(),
            LogStr::Wide(units) => units.iter().position(|u| *u == 0).unwrap_or(units.len()),
            LogStr::C(c) => c.map_or(0, |c| c.to_bytes().len()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The closed set of shapes the packer knows how to size and write.
#[derive(Clone, Copy)]
pub enum Encodable<'a> {
    Scalar(Scalar),
    String(LogStr<'a>),
    /// Statically sized array; the element count is not packed.
    FixedArray(&'a dyn Elements),
    /// Runtime sized sequence; packed as a `u32` count then the elements.
    DynamicArray(&'a dyn Elements),
    /// Packed as a count of 0 or 1 followed by the value when present.
    Optional(Option<&'a dyn DynLoggable>),
    /// Packed as a `u32` count then alternating keys and values.
    Map(&'a dyn Entries),
    Pair(&'a dyn DynLoggable, &'a dyn DynLoggable),
}

/// Element access for array-like encodables.
pub trait Elements {
    fn count(&self) -> usize;

    /// Encoded size shared by every element, when it is value independent.
    fn element_fixed_size(&self) -> Option<usize>;

    /// Calls `f` on at most `limit` elements, stopping early on `Break`.
    fn visit(&self, limit: usize, f: &mut dyn FnMut(Encodable<'_>) -> ControlFlow<()>);
}

/// Entry access for map encodables.
pub trait Entries {
    fn count(&self) -> usize;

    /// Encoded size of one key plus one value, when it is value independent.
    fn entry_fixed_size(&self) -> Option<usize>;

    fn visit(
        &self,
        limit: usize,
        f: &mut dyn FnMut(Encodable<'_>, Encodable<'_>) -> ControlFlow<()>,
    );
}

/// A type that can be passed as a log argument.
///
/// # Examples
///
/// ```
/// # use binary_log_packer::Loggable;
/// assert_eq!(<u32 as Loggable>::FIXED_SIZE, Some(4));
/// assert_eq!(<[u16; 8] as Loggable>::FIXED_SIZE, Some(16));
/// assert_eq!(<(u8, f64) as Loggable>::FIXED_SIZE, Some(9));
/// assert_eq!(<String as Loggable>::FIXED_SIZE, None);
/// assert_eq!(<Vec<u8> as Loggable>::FIXED_SIZE, None);
/// ```
pub trait Loggable {
    /// Encoded size when every value of the type packs to the same length.
    const FIXED_SIZE: Option<usize>;

    /// True for primitives, whose arrays pack as one leaf descriptor.
    const IS_SCALAR: bool = false;

    /// Appends the descriptors of this type, pre-order, to `out`.
    fn describe(param: &'static str, out: &mut Vec<TypeInfo>);

    fn encodable(&self) -> Encodable<'_>;
}

/// Object-safe view of [`Loggable`], implemented for every sized
/// `Loggable` type.
pub trait DynLoggable {
    fn fixed_size(&self) -> Option<usize>;
    fn describe_as(&self, param: &'static str, out: &mut Vec<TypeInfo>);
    fn to_encodable(&self) -> Encodable<'_>;
}

impl<T: Loggable> DynLoggable for T {
    #[inline]
    fn fixed_size(&self) -> Option<usize> {
        T::FIXED_SIZE
    }

    fn describe_as(&self, param: &'static str, out: &mut Vec<TypeInfo>) {
        T::describe(param, out)
    }

    #[inline]
    fn to_encodable(&self) -> Encodable<'_> {
        self.encodable()
    }
}

/// Pushes `info`, lets `children` append the sub-descriptors, then records
/// how many were added.
fn describe_compound(
    out: &mut Vec<TypeInfo>,
    info: TypeInfo,
    children: impl FnOnce(&mut Vec<TypeInfo>),
) {
    let index = out.len();
    out.push(info);
    children(out);
    out[index].total_sub_entries = out.len() - index - 1;
}

const fn sum_fixed(a: Option<usize>, b: Option<usize>) -> Option<usize> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        _ => None,
    }
}

macro_rules! impl_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Loggable for $ty {
                const FIXED_SIZE: Option<usize> = Some(mem::size_of::<$ty>());
                const IS_SCALAR: bool = true;

                fn describe(param: &'static str, out: &mut Vec<TypeInfo>) {
                    out.push(TypeInfo::scalar::<$ty>().with_param(param));
                }

                #[inline]
                fn encodable(&self) -> Encodable<'_> {
                    Encodable::Scalar(Scalar::$variant(*self))
                }
            }
        )*
    };
}

impl_scalar! {
    bool => Bool,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    u128 => U128,
    usize => Usize,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    i128 => I128,
    isize => Isize,
    f32 => F32,
    f64 => F64,
    char => Char,
}

impl<T: Loggable + ?Sized> Loggable for &T {
    const FIXED_SIZE: Option<usize> = T::FIXED_SIZE;
    const IS_SCALAR: bool = T::IS_SCALAR;

    fn describe(param: &'static str, out: &mut Vec<TypeInfo>) {
        T::describe(param, out)
    }

    #[inline]
    fn encodable(&self) -> Encodable<'_> {
        (**self).encodable()
    }
}

// Strings

impl Loggable for str {
    const FIXED_SIZE: Option<usize> = None;

    fn describe(param: &'static str, out: &mut Vec<TypeInfo>) {
        out.push(TypeInfo::text::<u8>(any::type_name::<Self>()).with_param(param));
    }

    fn encodable(&self) -> Encodable<'_> {
        Encodable::String(LogStr::Utf8(self))
    }
}

impl Loggable for String {
    const FIXED_SIZE: Option<usize> = None;

    fn describe(param: &'static str, out: &mut Vec<TypeInfo>) {
        out.push(TypeInfo::text::<u8>(any::type_name::<Self>()).with_param(param));
    }

    fn encodable(&self) -> Encodable<'_> {
        Encodable::String(LogStr::Utf8(self.as_str()))
    }
}

impl Loggable for Cow<'_, str> {
    const FIXED_SIZE: Option<usize> = None;

    fn describe(param: &'static str, out: &mut Vec<TypeInfo>) {
        out.push(TypeInfo::text::<u8>(any::type_name::<Self>()).with_param(param));
    }

    fn encodable(&self) -> Encodable<'_> {
        Encodable::String(LogStr::Utf8(self.as_ref()))
    }
}

impl Loggable for CStr {
    const FIXED_SIZE: Option<usize> = None;

    fn describe(param: &'static str, out: &mut Vec<TypeInfo>) {
        out.push(TypeInfo::text::<u8>(any::type_name::<Self>()).with_param(param));
    }

    fn encodable(&self) -> Encodable<'_> {
        Encodable::String(LogStr::C(Some(self)))
    }
}

impl Loggable for CString {
    const FIXED_SIZE: Option<usize> = None;

    fn describe(param: &'static str, out: &mut Vec<TypeInfo>) {
        out.push(TypeInfo::text::<u8>(any::type_name::<Self>()).with_param(param));
    }

    fn encodable(&self) -> Encodable<'_> {
        Encodable::String(LogStr::C(Some(self.as_c_str())))
    }
}

/// A C string that may be null, packed like a `const char*`.
///
/// A null string packs as a zero count with no characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NullableCStr<'a>(pub Option<&'a CStr>);

impl Loggable for NullableCStr<'_> {
    const FIXED_SIZE: Option<usize> = None;

    fn describe(param: &'static str, out: &mut Vec<TypeInfo>) {
        out.push(TypeInfo::text::<u8>("const char*").with_param(param));
    }

    fn encodable(&self) -> Encodable<'_> {
        Encodable::String(LogStr::C(self.0))
    }
}

/// NUL-terminated or plain UTF-16 text, packed as 2-byte elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WideStr<'a>(pub &'a [u16]);

impl Loggable for WideStr<'_> {
    const FIXED_SIZE: Option<usize> = None;

    fn describe(param: &'static str, out: &mut Vec<TypeInfo>) {
        out.push(TypeInfo::text::<u16>("const wchar_t*").with_param(param));
    }

    fn encodable(&self) -> Encodable<'_> {
        Encodable::String(LogStr::Wide(self.0))
    }
}

// Arrays

impl<T: Loggable, const N: usize> Elements for [T; N] {
    fn count(&self) -> usize {
        N
    }

    fn element_fixed_size(&self) -> Option<usize> {
        T::FIXED_SIZE
    }

    fn visit(&self, limit: usize, f: &mut dyn FnMut(Encodable<'_>) -> ControlFlow<()>) {
        for value in self.iter().take(limit) {
            if f(value.encodable()).is_break() {
                break;
            }
        }
    }
}

impl<T: Loggable, const N: usize> Loggable for [T; N] {
    const FIXED_SIZE: Option<usize> = match T::FIXED_SIZE {
        Some(size) => Some(size * N),
        None => None,
    };

    fn describe(param: &'static str, out: &mut Vec<TypeInfo>) {
        if T::IS_SCALAR {
            let index = out.len();
            T::describe(param, out);
            out[index].type_name = any::type_name::<Self>();
            out[index].kind = TypeKind::FixedArray;
            out[index].total_elements = N;
        } else {
            let info = TypeInfo::compound(any::type_name::<Self>(), TypeKind::FixedArray, N)
                .with_param(param);
            describe_compound(out, info, |out| T::describe("array", out));
        }
    }

    fn encodable(&self) -> Encodable<'_> {
        Encodable::FixedArray(self)
    }
}

macro_rules! impl_sequence {
    ($($container:ident $(<$bound:path>)?),* $(,)?) => {
        $(
            impl<T: Loggable $(+ $bound)?> Elements for $container<T> {
                fn count(&self) -> usize {
                    self.len()
                }

                fn element_fixed_size(&self) -> Option<usize> {
                    T::FIXED_SIZE
                }

                fn visit(&self, limit: usize, f: &mut dyn FnMut(Encodable<'_>) -> ControlFlow<()>) {
                    for value in self.iter().take(limit) {
                        if f(value.encodable()).is_break() {
                            break;
                        }
                    }
                }
            }

            impl<T: Loggable $(+ $bound)?> Loggable for $container<T> {
                const FIXED_SIZE: Option<usize> = None;

                fn describe(param: &'static str, out: &mut Vec<TypeInfo>) {
                    let info = TypeInfo::compound(any::type_name::<Self>(), TypeKind::DynamicArray, 0)
                        .with_param(param);
                    describe_compound(out, info, |out| T::describe("value", out));
                }

                fn encodable(&self) -> Encodable<'_> {
                    Encodable::DynamicArray(self)
                }
            }
        )*
    };
}

impl_sequence!(Vec, VecDeque, LinkedList, BTreeSet<Ord>);

impl<T: Loggable, S: BuildHasher> Elements for HashSet<T, S> {
    fn count(&self) -> usize {
        self.len()
    }

    fn element_fixed_size(&self) -> Option<usize> {
        T::FIXED_SIZE
    }

    fn visit(&self, limit: usize, f: &mut dyn FnMut(Encodable<'_>) -> ControlFlow<()>) {
        for value in self.iter().take(limit) {
            if f(value.encodable()).is_break() {
                break;
            }
        }
    }
}

impl<T: Loggable, S: BuildHasher> Loggable for HashSet<T, S> {
    const FIXED_SIZE: Option<usize> = None;

    fn describe(param: &'static str, out: &mut Vec<TypeInfo>) {
        let info = TypeInfo::compound(any::type_name::<Self>(), TypeKind::DynamicArray, 0)
            .with_param(param);
        describe_compound(out, info, |out| T::describe("value", out));
    }

    fn encodable(&self) -> Encodable<'_> {
        Encodable::DynamicArray(self)
    }
}

impl<T: Loggable> Elements for &[T] {
    fn count(&self) -> usize {
        self.len()
    }

    fn element_fixed_size(&self) -> Option<usize> {
        T::FIXED_SIZE
    }

    fn visit(&self, limit: usize, f: &mut dyn FnMut(Encodable<'_>) -> ControlFlow<()>) {
        for value in self.iter().take(limit) {
            if f(value.encodable()).is_break() {
                break;
            }
        }
    }
}

impl<T: Loggable> Loggable for &[T] {
    const FIXED_SIZE: Option<usize> = None;

    fn describe(param: &'static str, out: &mut Vec<TypeInfo>) {
        let info = TypeInfo::compound(any::type_name::<Self>(), TypeKind::DynamicArray, 0)
            .with_param(param);
        describe_compound(out, info, |out| T::describe("value", out));
    }

    fn encodable(&self) -> Encodable<'_> {
        Encodable::DynamicArray(self)
    }
}

// Maps

macro_rules! impl_map {
    ($map:ident<K $(: $kbound:path)?, V $(, $hasher:ident: $hbound:path)?>) => {
        impl<K: Loggable $(+ $kbound)?, V: Loggable $(, $hasher: $hbound)?> Entries
            for $map<K, V $(, $hasher)?>
        {
            fn count(&self) -> usize {
                self.len()
            }

            fn entry_fixed_size(&self) -> Option<usize> {
                sum_fixed(K::FIXED_SIZE, V::FIXED_SIZE)
            }

            fn visit(
                &self,
                limit: usize,
                f: &mut dyn FnMut(Encodable<'_>, Encodable<'_>) -> ControlFlow<()>,
            ) {
                for (key, value) in self.iter().take(limit) {
                    if f(key.encodable(), value.encodable()).is_break() {
                        break;
                    }
                }
            }
        }

        impl<K: Loggable $(+ $kbound)?, V: Loggable $(, $hasher: $hbound)?> Loggable
            for $map<K, V $(, $hasher)?>
        {
            const FIXED_SIZE: Option<usize> = None;

            fn describe(param: &'static str, out: &mut Vec<TypeInfo>) {
                let info = TypeInfo::compound(any::type_name::<Self>(), TypeKind::Map, 0)
                    .with_param(param);
                describe_compound(out, info, |out| {
                    K::describe("key", out);
                    V::describe("value", out);
                });
            }

            fn encodable(&self) -> Encodable<'_> {
                Encodable::Map(self)
            }
        }
    };
}

impl_map!(BTreeMap<K: Ord, V>);
impl_map!(HashMap<K, V, S: BuildHasher>);

// Pointer-likes

impl<T: Loggable> Loggable for Option<T> {
    const FIXED_SIZE: Option<usize> = None;

    fn describe(param: &'static str, out: &mut Vec<TypeInfo>) {
        let info = TypeInfo::compound(any::type_name::<Self>(), TypeKind::Optional, 0)
            .with_param(param);
        describe_compound(out, info, |out| T::describe("ptr", out));
    }

    fn encodable(&self) -> Encodable<'_> {
        Encodable::Optional(self.as_ref().map(|value| value as &dyn DynLoggable))
    }
}

macro_rules! impl_owning_pointer {
    ($($pointer:ident),* $(,)?) => {
        $(
            /// Owning pointers are never null, so the presence count is always 1.
            impl<T: Loggable> Loggable for $pointer<T> {
                const FIXED_SIZE: Option<usize> = None;

                fn describe(param: &'static str, out: &mut Vec<TypeInfo>) {
                    let info = TypeInfo::compound(any::type_name::<Self>(), TypeKind::Optional, 0)
                        .with_param(param);
                    describe_compound(out, info, |out| T::describe("ptr", out));
                }

                fn encodable(&self) -> Encodable<'_> {
                    let value: &T = self;
                    Encodable::Optional(Some(value as &dyn DynLoggable))
                }
            }
        )*
    };
}

impl_owning_pointer!(Box, Rc, Arc);

// Pairs

impl<A: Loggable, B: Loggable> Loggable for (A, B) {
    const FIXED_SIZE: Option<usize> = sum_fixed(A::FIXED_SIZE, B::FIXED_SIZE);

    fn describe(param: &'static str, out: &mut Vec<TypeInfo>) {
        let info = TypeInfo::compound(any::type_name::<Self>(), TypeKind::Pair, 1)
            .with_param(param);
        describe_compound(out, info, |out| {
            A::describe("first", out);
            B::describe("second", out);
        });
    }

    fn encodable(&self) -> Encodable<'_> {
        Encodable::Pair(&self.0, &self.1)
    }
}
