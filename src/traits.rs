/// A type which can be written to an [`embedded_io::Write`] sink and knows its size.
pub trait Writable {
    /// Returns the amount of bytes [`Self::write_to`] will write when called.
    ///
    /// The returned value is used for remaining-length accumulation and for the
    /// transmit buffer pre-check, so it must match the written byte count exactly.
    fn size(&self) -> usize;

    /// Writes the encoded form to a [`sink`](embedded_io::Write).
    fn write_to<S>(&self, sink: S) -> Result<(), S::Error>
    where
        S: embedded_io::Write;
}

impl<T> Writable for Option<T>
where
    T: Writable,
{
    fn size(&self) -> usize {
        self.as_ref().map_or(0, |w| w.size())
    }

    fn write_to<S>(&self, sink: S) -> Result<(), S::Error>
    where
        S: embedded_io::Write,
    {
        if let Some(inner) = &self {
            inner.write_to(sink)?;
        }
        Ok(())
    }
}

impl<T> Writable for &[T]
where
    T: Writable,
{
    fn size(&self) -> usize {
        self.iter().map(|w| w.size()).sum()
    }

    fn write_to<S>(&self, mut sink: S) -> Result<(), S::Error>
    where
        S: embedded_io::Write,
    {
        for item in self.iter() {
            item.write_to(&mut sink)?;
        }

        Ok(())
    }
}

macro_rules! impl_writable_be_bytes {
    ($ty:ty) => {
        impl Writable for $ty {
            fn size(&self) -> usize {
                self.to_be_bytes().len()
            }

            fn write_to<S>(&self, mut sink: S) -> Result<(), S::Error>
            where
                S: embedded_io::Write,
            {
                sink.write_all(&self.to_be_bytes())
            }
        }
    };
}

impl_writable_be_bytes!(u8);
impl_writable_be_bytes!(u16);
