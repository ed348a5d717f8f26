//! Sizing and packing of log arguments.
//!
//! A record is packed in one of two ways:
//!
//! 1. **Fixed path**: when every argument has a value independent size the
//!    sizes are known without looking at the values, so the arguments are
//!    written straight into the destination with no count prefixes for
//!    scalars or fixed arrays.
//! 2. **Two-pass path**: otherwise each argument is first measured into an
//!    [`ArgSlot`] (pass 1), the longest prefix of arguments whose cumulative
//!    size fits the buffer is computed, and only that prefix is written
//!    (pass 2).
//!
//! Strings and containers are cut to the [`PackLimits`] caps before they are
//! measured, so pass 1 and pass 2 always agree on sizes. An argument is
//! either written whole or not at all.
//!
//! # Binary Format
//!
//! All values are little-endian. Counts are `u32`.
//!
//! * scalar: its bytes at natural width (`bool` is one byte, `char` four)
//! * string: `count | count * element_width` bytes
//! * fixed array: `N` packed elements, no count
//! * dynamic array: `count | count` packed elements
//! * optional: `0` or `1 | value`
//! * map: `count | (key | value) * count`
//! * pair: `first | second`

use std::ops::ControlFlow;

use crate::config::PackLimits;
use crate::loggable::{DynLoggable, Elements, Encodable, LogStr, Scalar};

/// Bytes used by an inline element count.
pub const SIZE_COUNT: usize = std::mem::size_of::<u32>();

/// Number of elements of `value` that will be packed after truncation.
///
/// Scalars and pairs count as one element.
pub fn truncated_count(value: Encodable<'_>, limits: &PackLimits) -> usize {
    match value {
        Encodable::Scalar(_) | Encodable::Pair(..) => 1,
        Encodable::String(s) => s.len().min(limits.max_string_length),
        Encodable::FixedArray(elements) => elements.count(),
        Encodable::DynamicArray(elements) => elements.count().min(limits.max_array_entries),
        Encodable::Optional(value) => usize::from(value.is_some()),
        Encodable::Map(entries) => entries.count().min(limits.max_array_entries),
    }
}

/// Encoded size of `value` in bytes, after truncation.
pub fn encoded_size(value: Encodable<'_>, limits: &PackLimits) -> usize {
    sized_with_count(value, truncated_count(value, limits), limits)
}

fn dyn_size(value: &dyn DynLoggable, limits: &PackLimits) -> usize {
    value
        .fixed_size()
        .unwrap_or_else(|| encoded_size(value.to_encodable(), limits))
}

fn elements_size(elements: &dyn Elements, count: usize, limits: &PackLimits) -> usize {
    if let Some(size) = elements.element_fixed_size() {
        return size * count;
    }

    let mut total = 0;
    elements.visit(count, &mut |element| {
        total += encoded_size(element, limits);
        ControlFlow::Continue(())
    });
    total
}

fn sized_with_count(value: Encodable<'_>, count: usize, limits: &PackLimits) -> usize {
    match value {
        Encodable::Scalar(scalar) => scalar.width(),
        Encodable::String(s) => SIZE_COUNT + count * s.element_width(),
        Encodable::FixedArray(elements) => elements_size(elements, count, limits),
        Encodable::DynamicArray(elements) => SIZE_COUNT + elements_size(elements, count, limits),
        Encodable::Optional(None) => SIZE_COUNT,
        Encodable::Optional(Some(value)) => SIZE_COUNT + dyn_size(value, limits),
        Encodable::Map(entries) => {
            let body = match entries.entry_fixed_size() {
                Some(size) => size * count,
                None => {
                    let mut total = 0;
                    entries.visit(count, &mut |key, value| {
                        total += encoded_size(key, limits) + encoded_size(value, limits);
                        ControlFlow::Continue(())
                    });
                    total
                }
            };
            SIZE_COUNT + body
        }
        Encodable::Pair(first, second) => dyn_size(first, limits) + dyn_size(second, limits),
    }
}

/// Bounded writer over a destination buffer.
///
/// A write that does not fit in the remaining capacity is skipped and drops
/// the remaining capacity to zero, so every later write is skipped too.
/// Nothing is ever written past the end of the buffer.
pub struct Packer<'b> {
    buf: &'b mut [u8],
    pos: usize,
    remaining: usize,
}

impl<'b> Packer<'b> {
    pub fn new(buf: &'b mut [u8]) -> Self {
        let remaining = buf.len();
        Self {
            buf,
            pos: 0,
            remaining,
        }
    }

    pub fn pack_data(&mut self, data: &[u8]) {
        if data.len() > self.remaining {
            self.remaining = 0;
            return;
        }
        self.buf[self.pos..self.pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
        self.remaining -= data.len();
    }

    pub fn pack_count(&mut self, count: usize) {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        self.pack_data(&count.to_le_bytes());
    }

    pub fn pack_scalar(&mut self, scalar: Scalar) {
        let mut bytes = [0u8; Scalar::MAX_WIDTH];
        let len = scalar.encode(&mut bytes);
        self.pack_data(&bytes[..len]);
    }

    /// Bytes written so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// Writes `value` into `packer`, truncated to `limits`.
pub fn pack(value: Encodable<'_>, packer: &mut Packer<'_>, limits: &PackLimits) {
    pack_with_count(value, truncated_count(value, limits), packer, limits)
}

fn pack_str(s: LogStr<'_>, count: usize, packer: &mut Packer<'_>) {
    packer.pack_count(count);
    match s {
        LogStr::Utf8(text) => packer.pack_data(&text.as_bytes()[..count]),
        LogStr::C(Some(text)) => packer.pack_data(&text.to_bytes()[..count]),
        LogStr::C(None) => {}
        LogStr::Wide(units) => {
            for unit in &units[..count] {
                packer.pack_data(&unit.to_le_bytes());
            }
        }
    }
}

fn pack_elements(elements: &dyn Elements, count: usize, packer: &mut Packer<'_>, limits: &PackLimits) {
    elements.visit(count, &mut |element| {
        if packer.is_exhausted() {
            return ControlFlow::Break(());
        }
        pack(element, packer, limits);
        ControlFlow::Continue(())
    });
}

fn pack_with_count(value: Encodable<'_>, count: usize, packer: &mut Packer<'_>, limits: &PackLimits) {
    match value {
        Encodable::Scalar(scalar) => packer.pack_scalar(scalar),
        Encodable::String(s) => pack_str(s, count, packer),
        Encodable::FixedArray(elements) => pack_elements(elements, count, packer, limits),
        Encodable::DynamicArray(elements) => {
            packer.pack_count(count);
            pack_elements(elements, count, packer, limits);
        }
        Encodable::Optional(value) => {
            packer.pack_count(count);
            if let Some(value) = value {
                pack(value.to_encodable(), packer, limits);
            }
        }
        Encodable::Map(entries) => {
            packer.pack_count(count);
            entries.visit(count, &mut |key, value| {
                if packer.is_exhausted() {
                    return ControlFlow::Break(());
                }
                pack(key, packer, limits);
                pack(value, packer, limits);
                ControlFlow::Continue(())
            });
        }
        Encodable::Pair(first, second) => {
            pack(first.to_encodable(), packer, limits);
            pack(second.to_encodable(), packer, limits);
        }
    }
}

/// Per-argument state carried from the size pass to the pack pass.
#[derive(Clone, Copy)]
pub struct ArgSlot<'a> {
    encodable: Encodable<'a>,
    count: usize,
    size: usize,
}

impl<'a> ArgSlot<'a> {
    /// Measures one argument. Measuring the same value again gives the same
    /// slot.
    pub fn measure(arg: &'a dyn DynLoggable, limits: &PackLimits) -> Self {
        let encodable = arg.to_encodable();
        let count = truncated_count(encodable, limits);
        let size = match arg.fixed_size() {
            Some(size) => size,
            None => sized_with_count(encodable, count, limits),
        };
        Self {
            encodable,
            count,
            size,
        }
    }

    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Elements kept after truncation.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn pack_into(&self, packer: &mut Packer<'_>, limits: &PackLimits) {
        pack_with_count(self.encodable, self.count, packer, limits);
    }
}

/// What one call to [`pack_args`] produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackOutcome {
    /// Bytes written to the destination.
    pub len: usize,
    /// Arguments written, always a prefix of the argument list.
    pub args_packed: usize,
    /// Bytes the whole record would need without the buffer cap.
    pub total_size: usize,
    /// True when trailing arguments were dropped for lack of room.
    pub truncated: bool,
}

/// Sum of the fixed sizes of `args`, or `None` when any size is value
/// dependent.
pub fn fixed_record_size(args: &[&dyn DynLoggable]) -> Option<usize> {
    args.iter().try_fold(0usize, |total, arg| Some(total + arg.fixed_size()?))
}

/// Number of leading sizes whose running total stays within `capacity`.
fn safely_packable(sizes: impl Iterator<Item = usize>, capacity: usize) -> usize {
    let mut total = 0usize;
    sizes
        .take_while(|size| {
            total += size;
            total <= capacity
        })
        .count()
}

/// Packs `args` into `out` and reports what was written.
///
/// The usable capacity is the smaller of `out.len()` and
/// `limits.max_buffer_size`. Arguments that do not fit are dropped from the
/// end; the function never fails and never panics because of size.
///
/// # Examples
///
/// ```
/// # use binary_log_packer::{pack_args, DynLoggable, PackLimits};
/// let hello = "hello";
/// let mut out = [0u8; 64];
/// let outcome = pack_args([&hello as &dyn DynLoggable, &2i32], &PackLimits::DEFAULT, &mut out);
/// assert_eq!(outcome.len, 4 + 5 + 4);
/// assert_eq!(&out[..13], b"\x05\x00\x00\x00hello\x02\x00\x00\x00");
/// ```
pub fn pack_args<const N: usize>(
    args: [&dyn DynLoggable; N],
    limits: &PackLimits,
    out: &mut [u8],
) -> PackOutcome {
    if N == 0 {
        return PackOutcome::default();
    }

    let capacity = out.len().min(limits.max_buffer_size);
    let mut packer = Packer::new(&mut out[..capacity]);

    let outcome = match fixed_record_size(&args) {
        Some(total_size) => {
            let sizes = args.iter().map(|arg| arg.fixed_size().unwrap_or_default());
            let args_packed = safely_packable(sizes, capacity);
            for arg in &args[..args_packed] {
                pack(arg.to_encodable(), &mut packer, limits);
            }
            PackOutcome {
                len: packer.position(),
                args_packed,
                total_size,
                truncated: args_packed < N,
            }
        }
        None => {
            let slots = args.map(|arg| ArgSlot::measure(arg, limits));
            let total_size = slots.iter().map(ArgSlot::size).sum();
            let args_packed = safely_packable(slots.iter().map(ArgSlot::size), capacity);
            for slot in &slots[..args_packed] {
                slot.pack_into(&mut packer, limits);
            }
            PackOutcome {
                len: packer.position(),
                args_packed,
                total_size,
                truncated: args_packed < N,
            }
        }
    };

    if outcome.truncated {
        tracing::debug!(
            total_size = outcome.total_size,
            capacity,
            args = N,
            args_packed = outcome.args_packed,
            "log record truncated"
        );
    }
    outcome
}
