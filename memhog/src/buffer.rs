use std::{
    alloc::{self, Layout},
    ptr,
};

// smallest page size on supported targets. touching every 4KiB is enough
// to fault in larger pages as well.
const PAGE_SIZE: usize = 4096;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("failed to allocate {size} bytes of zeroed memory")]
pub struct AllocationFailure {
    pub size: usize,
}

/// Contiguous block of zeroed bytes that is resident in memory once allocated.
#[derive(Debug)]
pub struct Buffer {
    bytes: Vec<u8>,
}

impl Buffer {
    pub fn zeroed(size: usize) -> Result<Self, AllocationFailure> {
        if size == 0 {
            return Ok(Self { bytes: Vec::new() });
        }
        let layout = Layout::array::<u8>(size).map_err(|_| AllocationFailure { size })?;
        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        if raw.is_null() {
            return Err(AllocationFailure { size });
        }
        // large zeroed allocations are usually fresh anonymous mappings that are
        // not backed until written, write a zero to every page to make them resident.
        // volatile so that stores into memory known to be zero are not elided.
        for offset in (0..size).step_by(PAGE_SIZE) {
            // SAFETY: offset < size, raw points to size bytes.
            unsafe { ptr::write_volatile(raw.add(offset), 0) };
        }
        // SAFETY: raw was allocated by the global allocator with the layout of [u8; size],
        // which is what Vec<u8> with capacity size expects. all bytes are initialized.
        let bytes = unsafe { Vec::from_raw_parts(raw, size, size) };
        Ok(Self { bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_zeroed(&self) -> bool {
        self.bytes.iter().all(|b| *b == 0)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_empty() {
        let buf = Buffer::zeroed(0).expect("empty buffer");
        assert!(buf.is_empty());
        assert!(buf.is_zeroed());
    }

    #[test]
    fn test_not_page_aligned() {
        let buf = Buffer::zeroed(3 * PAGE_SIZE + 17).expect("allocate");
        assert_eq!(buf.len(), 3 * PAGE_SIZE + 17);
        assert!(buf.is_zeroed());
    }

    #[test]
    fn test_too_large() {
        let size = isize::MAX as usize + 1;
        assert_eq!(Buffer::zeroed(size).unwrap_err(), AllocationFailure { size });
    }

    #[test]
    fn test_full_size() {
        let buf = Buffer::zeroed(100 << 20).expect("allocate 100MiB");
        assert_eq!(buf.len(), 104_857_600);
        assert!(buf.is_zeroed());
    }

    proptest! {
        #[test]
        fn zeroed_regardless_of_previous_contents(size in 0..(64usize << 10), fill in 1..=u8::MAX) {
            let mut previous = Buffer::zeroed(size).expect("allocate");
            previous.as_mut_slice().fill(fill);
            drop(previous);

            let buf = Buffer::zeroed(size).expect("allocate");
            prop_assert_eq!(buf.len(), size);
            prop_assert!(buf.is_zeroed());
        }
    }
}
