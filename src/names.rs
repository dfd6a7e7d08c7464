use crate::error::FsError;

pub const SHORT_NAME_LEN: usize = 11;
pub const BASE_LEN: usize = 8;
pub const EXT_LEN: usize = 3;

/// Maximum number of UCS-2 units in a long name.
pub const LONG_NAME_MAX_UNITS: usize = 255;
pub const UNITS_PER_SLOT: usize = 13;
pub const MAX_LFN_SLOTS: usize = 20;

/// An 8.3 name as stored in memory: 11 bytes, space padded, with the
/// kanji escape already undone (a leading 0xE5 stays 0xE5 here and becomes
/// 0x05 only in `disk_bytes`).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ShortName([u8; SHORT_NAME_LEN]);

fn is_valid_char(c: u8) -> bool {
    c.is_ascii_uppercase()
        || c.is_ascii_digit()
        || c >= 0x80
        || b"$%'-_@~`!(){}^#&".contains(&c)
}

fn normalize_char(c: u8) -> u8 {
    let up = c.to_ascii_uppercase();
    if is_valid_char(up) {
        up
    } else {
        b'_'
    }
}

impl ShortName {
    pub fn from_disk_bytes(raw: &[u8; SHORT_NAME_LEN]) -> Self {
        let mut name = *raw;
        if name[0] == 0x05 {
            name[0] = 0xE5;
        }
        Self(name)
    }

    pub fn disk_bytes(&self) -> [u8; SHORT_NAME_LEN] {
        let mut out = self.0;
        if out[0] == 0xE5 {
            out[0] = 0x05;
        }
        out
    }

    pub fn raw(&self) -> &[u8; SHORT_NAME_LEN] {
        &self.0
    }

    /// Parses a name that is already a legal 8.3 identifier. Lowercase
    /// letters are rejected, they only exist through the long name.
    pub fn parse(name: &str) -> Result<Self, FsError> {
        let bytes = name.as_bytes();
        let (base, ext) = match bytes.iter().rposition(|&c| c == b'.') {
            Some(pos) => (&bytes[..pos], &bytes[pos + 1..]),
            None => (bytes, &[][..]),
        };

        if base.is_empty() || base.len() > BASE_LEN || ext.len() > EXT_LEN {
            return Err(FsError::IllegalShortName);
        }
        if base.iter().chain(ext.iter()).any(|&c| !is_valid_char(c)) {
            return Err(FsError::IllegalShortName);
        }

        let mut out = [b' '; SHORT_NAME_LEN];
        out[..base.len()].copy_from_slice(base);
        out[BASE_LEN..BASE_LEN + ext.len()].copy_from_slice(ext);
        Ok(Self(out))
    }

    /// Derives a unique 8.3 alias for a long name. The plain uppercase form
    /// is preferred; on overflow or collision the base is truncated and a
    /// `~N` suffix appended, shrinking the base further once N needs more
    /// digits.
    pub fn generate(name: &str, exists: impl Fn(&ShortName) -> bool) -> Result<Self, FsError> {
        // A name that is 8.3 except for case keeps its plain uppercase
        // form; only overflow or collision brings in the numeric tail.
        if let Ok(plain) = Self::parse(&name.to_ascii_uppercase()) {
            if !exists(&plain) {
                return Ok(plain);
            }
        }

        let bytes = name.as_bytes();
        let (base_src, ext_src) = match bytes.iter().rposition(|&c| c == b'.') {
            Some(pos) => (&bytes[..pos], &bytes[pos + 1..]),
            None => (bytes, &[][..]),
        };

        let mut base: Vec<u8> = base_src
            .iter()
            .filter(|&&c| c != b' ' && c != b'.')
            .map(|&c| normalize_char(c))
            .collect();
        if base.is_empty() {
            base.extend_from_slice(b"FILE");
        }
        let ext: Vec<u8> = ext_src
            .iter()
            .filter(|&&c| c != b' ')
            .map(|&c| normalize_char(c))
            .take(EXT_LEN)
            .collect();

        for n in 1u32..1_000_000 {
            let digits = n.to_string();
            let keep = (BASE_LEN - 1 - digits.len()).min(6).min(base.len());

            let mut out = [b' '; SHORT_NAME_LEN];
            out[..keep].copy_from_slice(&base[..keep]);
            out[keep] = b'~';
            out[keep + 1..keep + 1 + digits.len()].copy_from_slice(digits.as_bytes());
            out[BASE_LEN..BASE_LEN + ext.len()].copy_from_slice(&ext);

            let candidate = Self(out);
            if !exists(&candidate) {
                return Ok(candidate);
            }
        }

        Err(FsError::DuplicateName)
    }

    /// The human-readable form, e.g. `FOO.TXT`.
    pub fn display(&self) -> String {
        let base_end = self.0[..BASE_LEN]
            .iter()
            .rposition(|&c| c != b' ')
            .map(|p| p + 1)
            .unwrap_or(0);
        let ext_end = self.0[BASE_LEN..]
            .iter()
            .rposition(|&c| c != b' ')
            .map(|p| p + 1)
            .unwrap_or(0);

        let mut out = String::with_capacity(SHORT_NAME_LEN + 1);
        out.extend(self.0[..base_end].iter().map(|&c| c as char));
        if ext_end > 0 {
            out.push('.');
            out.extend(self.0[BASE_LEN..BASE_LEN + ext_end].iter().map(|&c| c as char));
        }
        out
    }

    /// The rotate-and-add checksum carried by every slot of an LFN chain.
    pub fn checksum(&self) -> u8 {
        let mut sum = 0u8;
        for byte in self.disk_bytes() {
            sum = ((sum & 1) << 7).wrapping_add(sum >> 1).wrapping_add(byte);
        }
        sum
    }
}

/// Encodes a long name to UCS-2, enforcing the 255-unit limit.
pub fn utf16_units(name: &str) -> Result<Vec<u16>, FsError> {
    let units: Vec<u16> = name.encode_utf16().collect();
    if units.is_empty() {
        return Err(FsError::InvalidArgument("empty name"));
    }
    if units.len() > LONG_NAME_MAX_UNITS {
        return Err(FsError::NameTooLong);
    }
    Ok(units)
}

pub fn slots_for_units(len: usize) -> usize {
    (len + UNITS_PER_SLOT - 1) / UNITS_PER_SLOT
}
