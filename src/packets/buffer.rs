// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pixel and tensor buffers with explicit ownership.
//!
//! A [`Buffer`] either owns a private copy of the caller's data or borrows the
//! caller's [`HostArray`] allocation by holding one extra atomic strong reference on
//! it. The extra reference is released exactly once, when the last handle on the
//! buffer (packet clones and outstanding views included) goes away, on whichever
//! thread that happens.

use crate::errors::TaskError;
use crate::observability::messages::buffer::{ExternalReferenceReleased, UnsafeAliasingWarning};
use crate::observability::messages::StructuredLog;
use crate::packets::host_array::{byte_len, element_count, validate_shape, HostArray};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Element types a buffer can hold. Values are stored native-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    U8,
    U16,
    I32,
    F32,
}

impl ElementType {
    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            ElementType::U8 => 1,
            ElementType::U16 => 2,
            ElementType::I32 | ElementType::F32 => 4,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::U8 => "uint8",
            ElementType::U16 => "uint16",
            ElementType::I32 => "int32",
            ElementType::F32 => "float32",
        };
        f.write_str(name)
    }
}

/// A single element read out of a buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Element {
    U8(u8),
    U16(u16),
    I32(i32),
    F32(f32),
}

/// Whether a buffer copied the caller's data or aliases it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    Owned,
    Borrowed,
}

enum Storage {
    Owned(Vec<u8>),
    Borrowed {
        external: Arc<Vec<u8>>,
        start: usize,
        len: usize,
    },
}

struct BufferInner {
    storage: Storage,
    element_type: ElementType,
    shape: Vec<usize>,
    /// Layout of the source data at creation time.
    contiguous: bool,
    views: AtomicUsize,
}

impl BufferInner {
    fn bytes(&self) -> &[u8] {
        match &self.storage {
            Storage::Owned(bytes) => bytes,
            Storage::Borrowed { external, start, len } => &external[*start..*start + *len],
        }
    }
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        if let Storage::Borrowed { external, .. } = &self.storage {
            // The strong reference held in `external` is released right after this.
            ExternalReferenceReleased {
                element_type: self.element_type,
                remaining_refs: Arc::strong_count(external).saturating_sub(1),
            }
            .log();
        }
    }
}

/// Immutable pixel/tensor payload shared between packets.
///
/// Cloning a `Buffer` is reference-counted aliasing; it never copies data.
#[derive(Clone)]
pub struct Buffer {
    inner: Arc<BufferInner>,
}

impl Buffer {
    /// Copy the caller's data, compacting strided arrays into row-major order.
    pub fn create_owned(array: &HostArray) -> Buffer {
        Self::from_parts(
            Storage::Owned(array.to_contiguous_bytes()),
            array.element_type(),
            array.shape().to_vec(),
            array.is_contiguous(),
        )
    }

    /// Take ownership of bytes produced in-process, e.g. by a calculator.
    pub fn from_vec(bytes: Vec<u8>, element_type: ElementType, shape: &[usize]) -> Result<Buffer, TaskError> {
        let expected = byte_len(validate_shape(shape)?, element_type)?;
        if bytes.len() != expected {
            return Err(TaskError::invalid_argument(format!(
                "shape {:?} of {} needs {} bytes, got {}",
                shape,
                element_type,
                expected,
                bytes.len()
            )));
        }
        Ok(Self::from_parts(
            Storage::Owned(bytes),
            element_type,
            shape.to_vec(),
            true,
        ))
    }

    /// Alias the caller's allocation without copying.
    ///
    /// Fails with `InvalidArgument` for non-contiguous arrays. Borrowing an array that
    /// is still writeable logs an `UnsafeAliasingWarning`; the storage can no longer be
    /// mutated through the `HostArray` while the buffer is alive.
    pub fn create_borrowed(array: &HostArray) -> Result<Buffer, TaskError> {
        let (external, start, len) = array.contiguous_region().ok_or_else(|| {
            TaskError::invalid_argument(format!(
                "cannot borrow a non-contiguous {} array of shape {:?}; use an owned buffer",
                array.element_type(),
                array.shape()
            ))
        })?;

        if array.is_writeable() {
            UnsafeAliasingWarning {
                element_type: array.element_type(),
                shape: array.shape(),
                external_refs: Arc::strong_count(&external),
            }
            .log();
        }

        Ok(Self::from_parts(
            Storage::Borrowed { external, start, len },
            array.element_type(),
            array.shape().to_vec(),
            true,
        ))
    }

    fn from_parts(storage: Storage, element_type: ElementType, shape: Vec<usize>, contiguous: bool) -> Buffer {
        Buffer {
            inner: Arc::new(BufferInner {
                storage,
                element_type,
                shape,
                contiguous,
                views: AtomicUsize::new(0),
            }),
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.inner.element_type
    }

    pub fn shape(&self) -> &[usize] {
        &self.inner.shape
    }

    pub fn len(&self) -> usize {
        element_count(&self.inner.shape)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_len(&self) -> usize {
        self.inner.bytes().len()
    }

    pub fn ownership(&self) -> Ownership {
        match self.inner.storage {
            Storage::Owned(_) => Ownership::Owned,
            Storage::Borrowed { .. } => Ownership::Borrowed,
        }
    }

    pub fn is_contiguous(&self) -> bool {
        self.inner.contiguous
    }

    /// Views that have not been dropped yet.
    pub fn outstanding_views(&self) -> usize {
        self.inner.views.load(Ordering::Acquire)
    }

    /// Handles keeping this buffer alive: buffer clones, packets and views.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Read access to the data.
    ///
    /// Borrowed contiguous buffers hand out a read-only alias of the caller's
    /// storage; every other buffer hands out a private, writable copy. The view keeps
    /// the buffer alive even after every packet referencing it is gone.
    pub fn view(&self) -> BufferView {
        self.inner.views.fetch_add(1, Ordering::AcqRel);
        let copy = match &self.inner.storage {
            Storage::Borrowed { .. } if self.inner.contiguous => None,
            _ => Some(self.inner.bytes().to_vec()),
        };
        BufferView {
            inner: Arc::clone(&self.inner),
            copy,
        }
    }

    /// Read one element.
    ///
    /// `indices` must name every dimension. When the buffer has three or more
    /// dimensions and a single trailing channel, that channel index may be omitted.
    pub fn at(&self, indices: &[usize]) -> Result<Element, TaskError> {
        let shape = &self.inner.shape;
        let channel_omitted = shape.len() >= 3
            && shape.last() == Some(&1)
            && indices.len() + 1 == shape.len();

        if indices.len() != shape.len() && !channel_omitted {
            let expected = if shape.len() >= 3 && shape.last() == Some(&1) {
                format!("{} or {}", shape.len() - 1, shape.len())
            } else {
                shape.len().to_string()
            };
            return Err(TaskError::DimensionMismatch {
                expected,
                actual: indices.len(),
            });
        }

        let mut flat = 0usize;
        for (dimension, size) in shape.iter().enumerate() {
            let index = indices.get(dimension).copied().unwrap_or(0);
            if index >= *size {
                return Err(TaskError::IndexOutOfBounds {
                    dimension,
                    index,
                    size: *size,
                });
            }
            flat = flat * size + index;
        }

        Ok(read_element(self.inner.bytes(), self.inner.element_type, flat))
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("element_type", &self.inner.element_type)
            .field("shape", &self.inner.shape)
            .field("ownership", &self.ownership())
            .field("contiguous", &self.inner.contiguous)
            .finish()
    }
}

/// Outstanding view over a buffer's data.
pub struct BufferView {
    inner: Arc<BufferInner>,
    copy: Option<Vec<u8>>,
}

impl BufferView {
    pub fn as_bytes(&self) -> &[u8] {
        match &self.copy {
            Some(bytes) => bytes,
            None => self.inner.bytes(),
        }
    }

    /// Writable access, only for private copies.
    pub fn as_mut_bytes(&mut self) -> Option<&mut [u8]> {
        self.copy.as_deref_mut()
    }

    pub fn is_read_only(&self) -> bool {
        self.copy.is_none()
    }

    pub fn element_type(&self) -> ElementType {
        self.inner.element_type
    }

    pub fn shape(&self) -> &[usize] {
        &self.inner.shape
    }

    pub fn to_u8_vec(&self) -> Result<Vec<u8>, TaskError> {
        self.expect_type(ElementType::U8)?;
        Ok(self.as_bytes().to_vec())
    }

    pub fn to_u16_vec(&self) -> Result<Vec<u16>, TaskError> {
        self.expect_type(ElementType::U16)?;
        Ok(self
            .as_bytes()
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
            .collect())
    }

    pub fn to_i32_vec(&self) -> Result<Vec<i32>, TaskError> {
        self.expect_type(ElementType::I32)?;
        Ok(self
            .as_bytes()
            .chunks_exact(4)
            .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    pub fn to_f32_vec(&self) -> Result<Vec<f32>, TaskError> {
        self.expect_type(ElementType::F32)?;
        Ok(self
            .as_bytes()
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    fn expect_type(&self, wanted: ElementType) -> Result<(), TaskError> {
        if self.inner.element_type != wanted {
            return Err(TaskError::invalid_argument(format!(
                "buffer holds {}, not {}",
                self.inner.element_type, wanted
            )));
        }
        Ok(())
    }
}

impl Deref for BufferView {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Drop for BufferView {
    fn drop(&mut self) {
        self.inner.views.fetch_sub(1, Ordering::AcqRel);
    }
}

fn read_element(bytes: &[u8], element_type: ElementType, flat: usize) -> Element {
    let at = flat * element_type.size();
    match element_type {
        ElementType::U8 => Element::U8(bytes[at]),
        ElementType::U16 => Element::U16(u16::from_ne_bytes([bytes[at], bytes[at + 1]])),
        ElementType::I32 => Element::I32(i32::from_ne_bytes([
            bytes[at],
            bytes[at + 1],
            bytes[at + 2],
            bytes[at + 3],
        ])),
        ElementType::F32 => Element::F32(f32::from_ne_bytes([
            bytes[at],
            bytes[at + 1],
            bytes[at + 2],
            bytes[at + 3],
        ])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io;
    use std::sync::Mutex;

    fn gray(height: usize, width: usize) -> HostArray {
        HostArray::from_u8((0..(height * width) as u8).collect(), &[height, width]).unwrap()
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `body` under a fmt subscriber and return everything it logged.
    fn logged<T>(body: impl FnOnce() -> T) -> (T, String) {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let result = tracing::subscriber::with_default(subscriber, body);
        let text = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        (result, text)
    }

    #[test]
    fn test_borrowing_writeable_array_warns() {
        let array = gray(2, 2);
        let (buffer, text) = logged(|| Buffer::create_borrowed(&array));

        let buffer = buffer.unwrap();
        assert_eq!(buffer.ownership(), Ownership::Borrowed);
        assert!(text.contains("WARN"), "{text}");
        assert!(text.contains("Borrowing writeable uint8 array of shape [2, 2]"), "{text}");
        assert!(text.contains("external_refs=2"), "{text}");
    }

    #[test]
    fn test_borrowing_read_only_array_is_silent() {
        let mut array = gray(2, 2);
        array.set_read_only();
        let (buffer, text) = logged(|| Buffer::create_borrowed(&array));

        assert!(buffer.is_ok());
        assert!(!text.contains("WARN"), "{text}");
        assert!(!text.contains("Borrowing writeable"), "{text}");
    }

    #[test]
    fn test_from_vec_rejects_shape_that_overflows() {
        let err = Buffer::from_vec(vec![], ElementType::U8, &[usize::MAX, 2]).unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(_)));

        let err = Buffer::from_vec(vec![], ElementType::U16, &[usize::MAX]).unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(_)));

        let err = Buffer::from_vec(vec![0; 3], ElementType::U8, &[]).unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(_)));
    }

    #[test]
    fn test_borrowed_view_aliases_storage() {
        let mut array = gray(2, 3);
        array.set_read_only();
        let buffer = Buffer::create_borrowed(&array).unwrap();
        assert_eq!(buffer.ownership(), Ownership::Borrowed);

        let view = buffer.view();
        assert!(view.is_read_only());
        assert_eq!(view.as_bytes(), &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_borrow_rejects_non_contiguous() {
        let array = gray(2, 3).transposed();
        let err = Buffer::create_borrowed(&array).unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(_)));

        let owned = Buffer::create_owned(&array);
        assert!(!owned.is_contiguous());
        assert_eq!(owned.view().as_bytes(), &[0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_external_reference_released_once() {
        let array = gray(2, 2);
        assert_eq!(array.ref_count(), 1);

        let buffer = Buffer::create_borrowed(&array).unwrap();
        assert_eq!(array.ref_count(), 2);

        let clones: Vec<Buffer> = (0..4).map(|_| buffer.clone()).collect();
        assert_eq!(array.ref_count(), 2);
        drop(buffer);
        assert_eq!(array.ref_count(), 2);
        drop(clones);
        assert_eq!(array.ref_count(), 1);
    }

    #[test]
    fn test_view_outlives_buffer_handle() {
        let array = gray(1, 4);
        let buffer = Buffer::create_borrowed(&array).unwrap();
        let view = buffer.view();
        assert_eq!(buffer.outstanding_views(), 1);

        drop(buffer);
        assert_eq!(array.ref_count(), 2);
        assert_eq!(view.as_bytes(), &[0, 1, 2, 3]);

        drop(view);
        assert_eq!(array.ref_count(), 1);
    }

    #[test]
    fn test_owned_view_is_private_copy() {
        let mut array = gray(2, 2);
        let buffer = Buffer::create_owned(&array);
        assert_eq!(array.ref_count(), 1);

        array.as_mut_bytes().unwrap()[0] = 200;

        let mut view = buffer.view();
        assert!(!view.is_read_only());
        assert_eq!(view.as_bytes()[0], 0);

        view.as_mut_bytes().unwrap()[0] = 42;
        assert_eq!(buffer.view().as_bytes()[0], 0);
    }

    #[test]
    fn test_indexing_two_dimensional() {
        let buffer = Buffer::create_owned(&gray(2, 3));
        assert_eq!(buffer.at(&[1, 2]).unwrap(), Element::U8(5));

        let err = buffer.at(&[0, 0, 0]).unwrap_err();
        assert!(matches!(err, TaskError::DimensionMismatch { actual: 3, .. }));

        let err = buffer.at(&[2, 0]).unwrap_err();
        assert_eq!(
            err,
            TaskError::IndexOutOfBounds {
                dimension: 0,
                index: 2,
                size: 2
            }
        );
        let err = buffer.at(&[0, 3]).unwrap_err();
        assert!(matches!(err, TaskError::IndexOutOfBounds { dimension: 1, .. }));
    }

    #[test]
    fn test_indexing_single_channel_may_omit_channel() {
        let array = HostArray::from_u16(&[10, 20, 30, 40], &[2, 2, 1]).unwrap();
        let buffer = Buffer::create_owned(&array);
        assert_eq!(buffer.at(&[1, 0]).unwrap(), Element::U16(30));
        assert_eq!(buffer.at(&[1, 1, 0]).unwrap(), Element::U16(40));

        let rgb = HostArray::from_u8(vec![0; 12], &[2, 2, 3]).unwrap();
        let err = Buffer::create_owned(&rgb).at(&[0, 0]).unwrap_err();
        assert!(matches!(err, TaskError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_typed_view_rejects_wrong_type() {
        let array = HostArray::from_f32(&[0.5, 1.5], &[2]).unwrap();
        let view = Buffer::create_owned(&array).view();
        assert_eq!(view.to_f32_vec().unwrap(), vec![0.5, 1.5]);
        assert!(matches!(view.to_u8_vec(), Err(TaskError::InvalidArgument(_))));
    }

    fn arbitrary_array() -> impl Strategy<Value = HostArray> {
        (prop::collection::vec(1usize..5, 1..=4), 0u8..3).prop_flat_map(|(shape, kind)| {
            let count: usize = shape.iter().product();
            prop::collection::vec(any::<u8>(), count * 4).prop_map(move |raw| {
                match kind {
                    0 => HostArray::from_u8(raw[..count].to_vec(), &shape),
                    1 => {
                        let values: Vec<u16> = raw
                            .chunks_exact(2)
                            .take(count)
                            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
                            .collect();
                        HostArray::from_u16(&values, &shape)
                    }
                    _ => {
                        let values: Vec<f32> = raw
                            .chunks_exact(4)
                            .map(|c| f32::from(c[0]) * 0.25 - f32::from(c[1]))
                            .collect();
                        HostArray::from_f32(&values, &shape)
                    }
                }
                .unwrap()
            })
        })
    }

    proptest! {
        #[test]
        fn prop_borrowed_view_matches_source(array in arbitrary_array()) {
            let expected = array.to_contiguous_bytes();
            let buffer = Buffer::create_borrowed(&array).unwrap();
            let view = buffer.view();
            prop_assert_eq!(view.as_bytes(), expected.as_slice());
        }

        #[test]
        fn prop_owned_view_round_trips(array in arbitrary_array()) {
            let buffer = Buffer::create_owned(&array);
            let view = buffer.view();
            let expected = array.to_contiguous_bytes();
            prop_assert_eq!(view.as_bytes(), expected.as_slice());
            prop_assert_eq!(buffer.shape(), array.shape());
        }

        #[test]
        fn prop_owned_copy_isolated_from_source(array in arbitrary_array()) {
            let mut array = array;
            let before = array.to_contiguous_bytes();
            let buffer = Buffer::create_owned(&array);
            if let Some(bytes) = array.as_mut_bytes() {
                for byte in bytes.iter_mut() {
                    *byte = byte.wrapping_add(1);
                }
            }
            let view = buffer.view();
            prop_assert_eq!(view.as_bytes(), before.as_slice());
        }
    }
}
