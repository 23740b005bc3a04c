use core::fmt::{self, Debug};

/// The error type used by this library.
///
/// This can encapsulate an SPI or GPIO error, and adds its own protocol errors
/// on top of that.
pub enum Error<S, P> {
    /// An SPI transfer failed.
    Spi(S),
    /// Driving the write protect or reset line failed.
    Pin(P),
    /// The device did not report ready within the configured poll budget.
    Unresponsive,
    /// The output sink of a page dump refused more text.
    Format,
}

#[cfg(feature = "defmt-03")]
impl<S, P> defmt::Format for Error<S, P> {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Error::Spi(_) => defmt::write!(fmt, "Error::Spi"),
            Error::Pin(_) => defmt::write!(fmt, "Error::Pin"),
            Error::Unresponsive => defmt::write!(fmt, "Error::Unresponsive"),
            Error::Format => defmt::write!(fmt, "Error::Format"),
        }
    }
}

impl<S: Debug, P: Debug> Debug for Error<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Spi(spi) => write!(f, "Error::Spi({:?})", spi),
            Error::Pin(pin) => write!(f, "Error::Pin({:?})", pin),
            Error::Unresponsive => f.write_str("Error::Unresponsive"),
            Error::Format => f.write_str("Error::Format"),
        }
    }
}

impl<S, P> From<fmt::Error> for Error<S, P> {
    fn from(_: fmt::Error) -> Self {
        Error::Format
    }
}
