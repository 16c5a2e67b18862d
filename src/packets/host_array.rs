// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Caller-side n-dimensional arrays.
//!
//! A [`HostArray`] is the allocation a caller owns before handing pixel or tensor
//! data to a task. Its storage is an atomically reference-counted byte vector, so a
//! borrowed [`Buffer`](crate::packets::Buffer) can keep the allocation alive across
//! engine threads by holding one more strong reference. Cloning a `HostArray` or
//! taking a strided view of it shares the same storage, the way array views do in
//! numeric libraries.

use crate::errors::TaskError;
use crate::packets::buffer::ElementType;
use std::sync::Arc;

/// Strided array over shared, reference-counted storage.
#[derive(Clone, Debug)]
pub struct HostArray {
    storage: Arc<Vec<u8>>,
    element_type: ElementType,
    shape: Vec<usize>,
    /// Per-dimension strides, in elements.
    strides: Vec<usize>,
    /// Offset of the first element, in elements.
    offset: usize,
    writeable: bool,
}

impl HostArray {
    /// Wrap raw native-endian bytes laid out in row-major order.
    pub fn new(bytes: Vec<u8>, element_type: ElementType, shape: &[usize]) -> Result<Self, TaskError> {
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
        Ok(Self {
            storage: Arc::new(bytes),
            element_type,
            shape: shape.to_vec(),
            strides: row_major_strides(shape),
            offset: 0,
            writeable: true,
        })
    }

    pub fn from_u8(values: Vec<u8>, shape: &[usize]) -> Result<Self, TaskError> {
        Self::new(values, ElementType::U8, shape)
    }

    pub fn from_u16(values: &[u16], shape: &[usize]) -> Result<Self, TaskError> {
        let bytes = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        Self::new(bytes, ElementType::U16, shape)
    }

    pub fn from_i32(values: &[i32], shape: &[usize]) -> Result<Self, TaskError> {
        let bytes = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        Self::new(bytes, ElementType::I32, shape)
    }

    pub fn from_f32(values: &[f32], shape: &[usize]) -> Result<Self, TaskError> {
        let bytes = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        Self::new(bytes, ElementType::F32, shape)
    }

    /// A view over the same storage with explicit shape, strides and offset (in elements).
    pub fn strided(&self, shape: &[usize], strides: &[usize], offset: usize) -> Result<Self, TaskError> {
        let count = validate_shape(shape)?;
        if shape.len() != strides.len() {
            return Err(TaskError::invalid_argument(format!(
                "shape {:?} and strides {:?} differ in rank",
                shape, strides
            )));
        }
        let capacity = self.storage.len() / self.element_type.size();
        if count == 0 {
            if offset > capacity {
                return Err(TaskError::invalid_argument(format!(
                    "offset {} is past the end of a {}-element allocation",
                    offset, capacity
                )));
            }
        } else {
            let last = shape
                .iter()
                .zip(strides)
                .try_fold(offset, |acc, (dim, stride)| {
                    (dim - 1).checked_mul(*stride)?.checked_add(acc)
                })
                .ok_or_else(|| {
                    TaskError::invalid_argument(format!(
                        "strided view with shape {:?}, strides {:?} and offset {} overflows",
                        shape, strides, offset
                    ))
                })?;
            if last >= capacity {
                return Err(TaskError::invalid_argument(format!(
                    "strided view reaches element {} of a {}-element allocation",
                    last, capacity
                )));
            }
        }
        Ok(Self {
            storage: Arc::clone(&self.storage),
            element_type: self.element_type,
            shape: shape.to_vec(),
            strides: strides.to_vec(),
            offset,
            writeable: self.writeable,
        })
    }

    /// Reverse the axes, sharing storage. The result is non-contiguous whenever
    /// two or more dimensions are larger than one.
    pub fn transposed(&self) -> Self {
        let mut shape = self.shape.clone();
        let mut strides = self.strides.clone();
        shape.reverse();
        strides.reverse();
        Self {
            storage: Arc::clone(&self.storage),
            element_type: self.element_type,
            shape,
            strides,
            offset: self.offset,
            writeable: self.writeable,
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        element_count(&self.shape)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major contiguity; dimensions of size one are ignored.
    pub fn is_contiguous(&self) -> bool {
        let mut expected = 1;
        for (dim, stride) in self.shape.iter().zip(&self.strides).rev() {
            if *dim == 1 {
                continue;
            }
            if *stride != expected {
                return false;
            }
            expected *= dim;
        }
        true
    }

    pub fn is_writeable(&self) -> bool {
        self.writeable
    }

    /// Mark the array immutable. Borrowing a read-only array does not warn.
    pub fn set_read_only(&mut self) {
        self.writeable = false;
    }

    /// Number of live handles on the underlying allocation, this one included.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.storage)
    }

    /// Mutable access to this array's elements.
    ///
    /// Only available while the array is writeable, contiguous and the sole owner of
    /// its storage; any buffer, view or clone sharing the allocation blocks mutation.
    pub fn as_mut_bytes(&mut self) -> Option<&mut [u8]> {
        if !self.writeable || !self.is_contiguous() {
            return None;
        }
        let size = self.element_type.size();
        let start = self.offset * size;
        let end = start + self.len() * size;
        Arc::get_mut(&mut self.storage).map(|bytes| &mut bytes[start..end])
    }

    /// Copy the elements into a fresh row-major byte vector.
    pub fn to_contiguous_bytes(&self) -> Vec<u8> {
        let size = self.element_type.size();
        if self.is_contiguous() {
            let start = self.offset * size;
            return self.storage[start..start + self.len() * size].to_vec();
        }

        let mut out = Vec::with_capacity(self.len() * size);
        if self.is_empty() {
            return out;
        }
        let mut index = vec![0usize; self.shape.len()];
        loop {
            let element = self.offset
                + index
                    .iter()
                    .zip(&self.strides)
                    .map(|(i, stride)| i * stride)
                    .sum::<usize>();
            out.extend_from_slice(&self.storage[element * size..(element + 1) * size]);

            // Odometer increment over the multi-index, last axis fastest.
            let mut axis = self.shape.len();
            loop {
                if axis == 0 {
                    return out;
                }
                axis -= 1;
                index[axis] += 1;
                if index[axis] < self.shape[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }
    }

    /// Shared handle on the storage plus the byte range of this array, if contiguous.
    pub(crate) fn contiguous_region(&self) -> Option<(Arc<Vec<u8>>, usize, usize)> {
        if !self.is_contiguous() {
            return None;
        }
        let size = self.element_type.size();
        Some((
            Arc::clone(&self.storage),
            self.offset * size,
            self.len() * size,
        ))
    }
}

/// Element count of a shape already accepted by [`validate_shape`].
pub(crate) fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Bytes needed for `count` elements of `element_type`.
pub(crate) fn byte_len(count: usize, element_type: ElementType) -> Result<usize, TaskError> {
    count.checked_mul(element_type.size()).ok_or_else(|| {
        TaskError::invalid_argument(format!(
            "{} elements of {} do not fit in memory",
            count, element_type
        ))
    })
}

fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}

/// Check a shape and return its element count.
///
/// The product of the non-zero dimensions must fit in `usize`, so every partial
/// product taken later (strides, contiguity checks, counts) is free of overflow.
pub(crate) fn validate_shape(shape: &[usize]) -> Result<usize, TaskError> {
    if shape.is_empty() {
        return Err(TaskError::invalid_argument("array shape must have at least one dimension"));
    }
    shape
        .iter()
        .filter(|dim| **dim != 0)
        .try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
        .ok_or_else(|| {
            TaskError::invalid_argument(format!("shape {:?} has too many elements", shape))
        })?;
    Ok(element_count(shape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_rejects_wrong_length() {
        let err = HostArray::new(vec![0u8; 5], ElementType::U8, &[2, 3]).unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(_)));
    }

    #[test]
    fn test_transposed_is_not_contiguous() {
        let array = HostArray::from_u8((0..6).collect(), &[2, 3]).unwrap();
        assert!(array.is_contiguous());

        let transposed = array.transposed();
        assert!(!transposed.is_contiguous());
        assert_eq!(transposed.shape(), &[3, 2]);
        assert_eq!(transposed.to_contiguous_bytes(), vec![0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_strided_crop_copies_selected_elements() {
        // 3x3 array, take the bottom-right 2x2 block.
        let array = HostArray::from_u8((0..9).collect(), &[3, 3]).unwrap();
        let crop = array.strided(&[2, 2], &[3, 1], 4).unwrap();
        assert!(!crop.is_contiguous());
        assert_eq!(crop.to_contiguous_bytes(), vec![4, 5, 7, 8]);

        let err = array.strided(&[3, 3], &[3, 1], 1).unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(_)));
    }

    #[test]
    fn test_mutation_blocked_while_shared() {
        let mut array = HostArray::from_u8(vec![1, 2, 3, 4], &[4]).unwrap();
        let clone = array.clone();
        assert_eq!(array.ref_count(), 2);
        assert!(array.as_mut_bytes().is_none());

        drop(clone);
        let bytes = array.as_mut_bytes().unwrap();
        bytes[0] = 9;
        assert_eq!(array.to_contiguous_bytes(), vec![9, 2, 3, 4]);

        array.set_read_only();
        assert!(array.as_mut_bytes().is_none());
    }

    #[test]
    fn test_typed_constructors() {
        let array = HostArray::from_f32(&[1.0, 2.5], &[1, 2]).unwrap();
        assert_eq!(array.element_type(), ElementType::F32);
        assert_eq!(array.to_contiguous_bytes().len(), 8);
    }

    #[test]
    fn test_new_rejects_shape_that_overflows() {
        let err = HostArray::new(vec![], ElementType::U8, &[usize::MAX, 2]).unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(_)));

        // Element count fits, byte length does not.
        let err = HostArray::new(vec![], ElementType::F32, &[usize::MAX / 2]).unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(_)));

        // A zero dimension does not excuse the others.
        let err = HostArray::new(vec![], ElementType::U8, &[0, usize::MAX, 2]).unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(_)));
    }

    #[test]
    fn test_strided_rejects_reach_that_overflows() {
        let array = HostArray::from_u8((0..9).collect(), &[9]).unwrap();
        let err = array.strided(&[3], &[usize::MAX / 2 + 1], 0).unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(_)));

        let err = array.strided(&[2], &[1], usize::MAX).unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(_)));

        let err = array.strided(&[0, 3], &[1, 1], usize::MAX).unwrap_err();
        assert!(matches!(err, TaskError::InvalidArgument(_)));

        let empty = array.strided(&[0, 3], &[3, 1], 9).unwrap();
        assert!(empty.to_contiguous_bytes().is_empty());
    }

    proptest! {
        #[test]
        fn prop_strided_views_stay_inside_storage(
            shape in prop::collection::vec(0usize..6, 1..4),
            strides in prop::collection::vec(any::<usize>(), 3),
            offset in prop_oneof![0usize..64, any::<usize>()],
        ) {
            let array = HostArray::from_u8((0..64).collect(), &[64]).unwrap();
            let strides = &strides[..shape.len()];
            if let Ok(view) = array.strided(&shape, strides, offset) {
                prop_assert_eq!(view.to_contiguous_bytes().len(), view.len());
            }
        }
    }
}
