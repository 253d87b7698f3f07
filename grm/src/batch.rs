use crate::error::{Error, Result};

/// An ordered set of mutable record handles processed as one unit.
///
/// The handles alias the caller's storage: a batch read writes decoded
/// records straight into the slots it was built from, and a batch write
/// touches timestamps in place.
pub struct Batch<'a, M> {
    items: Vec<&'a mut M>,
}

impl<'a, M> Batch<'a, M> {
    /// A batch of exactly one record.
    pub fn one(model: &'a mut M) -> Self {
        Self { items: vec![model] }
    }

    /// A batch over every element of a slice, in slice order.
    pub fn many(models: &'a mut [M]) -> Self {
        Self {
            items: models.iter_mut().collect(),
        }
    }

    /// A batch over handles gathered elsewhere, kept in the given order.
    pub fn from_handles(items: Vec<&'a mut M>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The ordered handles. An empty batch is [`Error::InvalidInput`].
    pub(crate) fn into_handles(self) -> Result<Vec<&'a mut M>> {
        if self.items.is_empty() {
            return Err(Error::InvalidInput(
                "expected a record or a non-empty collection of records".into(),
            ));
        }
        Ok(self.items)
    }
}

impl<'a, M> From<Vec<&'a mut M>> for Batch<'a, M> {
    fn from(items: Vec<&'a mut M>) -> Self {
        Self::from_handles(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one() {
        let mut x = 1;
        let batch = Batch::one(&mut x);
        assert_eq!(batch.len(), 1);
        for h in batch.into_handles().unwrap() {
            *h = 2;
        }
        assert_eq!(x, 2);
    }

    #[test]
    fn test_many_keeps_order_and_aliases() {
        let mut xs = vec![1, 2, 3];
        let handles = Batch::many(&mut xs).into_handles().unwrap();
        for (i, h) in handles.into_iter().enumerate() {
            assert_eq!(*h, i + 1);
            *h *= 10;
        }
        assert_eq!(xs, vec![10, 20, 30]);
    }

    #[test]
    fn test_from_handles() {
        let mut a = 1;
        let mut b = 2;
        let batch = Batch::from(vec![&mut b, &mut a]);
        let handles = batch.into_handles().unwrap();
        assert_eq!(*handles[0], 2);
        assert_eq!(*handles[1], 1);
    }

    #[test]
    fn test_empty_batch_is_invalid_input() {
        let mut xs: Vec<u8> = Vec::new();
        let batch = Batch::many(&mut xs);
        assert!(batch.is_empty());
        assert!(matches!(batch.into_handles(), Err(Error::InvalidInput(_))));
    }
}
