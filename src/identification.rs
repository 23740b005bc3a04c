use crate::status::Status;

/// Raw response of the Manufacturer and Device ID command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct DeviceId(pub [u8; 4]);

impl DeviceId {
    /// Adesto manufacturer code, DataFlash 8 Mbit family, variant 0.
    pub const EXPECTED_SIGNATURE: [u8; 3] = [0x1F, 0x25, 0x00];

    pub fn manufacturer(&self) -> u8 {
        self.0[0]
    }

    /// Family code (top 3 bits) and density code (low 5 bits).
    pub fn family_density(&self) -> u8 {
        self.0[1]
    }

    /// Sub code and product variant.
    pub fn variant(&self) -> u8 {
        self.0[2]
    }

    /// Length of the extended device information that would follow.
    pub fn extended_info_len(&self) -> u8 {
        self.0[3]
    }

    pub fn matches_expected(&self) -> bool {
        self.0[..3] == Self::EXPECTED_SIGNATURE
    }
}

/// Outcome of the self test.
///
/// The raw id and status are kept even on failure so they can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct Diagnosis {
    pub id: DeviceId,
    pub status: Status,
}

impl Diagnosis {
    pub fn id_ok(&self) -> bool {
        self.id.matches_expected()
    }

    pub fn status_ok(&self) -> bool {
        self.status.matches_expected()
    }

    pub fn is_ok(&self) -> bool {
        self.id_ok() && self.status_ok()
    }
}
