use std::fmt;

use crate::common::exception::CubeResult;

/// Opaque key of one cell in the aggregate space.
///
/// The coordinator never looks inside an address; it only hashes and compares
/// them. Engines and builders decide how coordinates are encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(Box<[u8]>);

impl Address {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self(key.into().into_boxed_slice())
    }

    /// Joins coordinate parts with a `0x00` separator.
    pub fn from_parts<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        let mut key = Vec::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                key.push(0);
            }
            key.extend_from_slice(part.as_ref());
        }
        Self::new(key)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Address {
    fn from(key: &str) -> Self {
        Self::new(key.as_bytes())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.split(|b| *b == 0).enumerate() {
            if i > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", String::from_utf8_lossy(part))?;
        }
        Ok(())
    }
}

/// Produces an [`Address`] from caller-side coordinates.
pub trait AddressBuilder {
    fn build(&self) -> CubeResult<Address>;
}

impl AddressBuilder for Address {
    fn build(&self) -> CubeResult<Address> {
        Ok(self.clone())
    }
}
