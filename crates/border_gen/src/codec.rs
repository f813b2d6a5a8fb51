use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::ValueEnum;
use data_encoding::BASE32;

/// How asset filename stems are obfuscated in the served directory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum NameCodec {
    /// Stems are the names themselves.
    #[default]
    Plain,
    /// RFC 4648 base32 with padding.
    Base32,
    /// Standard-alphabet base64.
    Base64,
}

impl std::fmt::Display for NameCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NameCodec::Plain => "plain",
            NameCodec::Base32 => "base32",
            NameCodec::Base64 => "base64",
        };

        f.write_str(s)
    }
}

impl NameCodec {
    pub fn encode(self, name: &str) -> String {
        match self {
            NameCodec::Plain => name.to_owned(),
            NameCodec::Base32 => BASE32.encode(name.as_bytes()),
            NameCodec::Base64 => STANDARD.encode(name.as_bytes()),
        }
    }

    /// Decode a stem; anything that is not valid encoded UTF-8 comes back unchanged.
    pub fn decode_or_raw(self, stem: &str) -> String {
        let bytes = match self {
            NameCodec::Plain => return stem.to_owned(),
            NameCodec::Base32 => BASE32.decode(stem.as_bytes()).ok(),
            NameCodec::Base64 => STANDARD.decode(stem).ok(),
        };

        bytes
            .and_then(|b| String::from_utf8(b).ok())
            .unwrap_or_else(|| stem.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base32_matches_rfc4648() {
        assert_eq!(NameCodec::Base32.encode("France"), "IZZGC3TDMU======");
        assert_eq!(
            NameCodec::Base32.decode_or_raw("KBSXI2LUMUQMHDTMMU======"),
            "Petite Île"
        );
    }

    #[test]
    fn base64_standard_alphabet() {
        assert_eq!(NameCodec::Base64.encode("Tiny Island"), "VGlueSBJc2xhbmQ=");
        assert_eq!(NameCodec::Base64.decode_or_raw("RnJhbmNl"), "France");
    }

    #[test]
    fn undecodable_stems_pass_through() {
        assert_eq!(NameCodec::Base32.decode_or_raw("France"), "France");
        assert_eq!(NameCodec::Base32.decode_or_raw("icon"), "icon");
        assert_eq!(NameCodec::Base64.decode_or_raw("Côte d'Ivoire"), "Côte d'Ivoire");
        assert_eq!(NameCodec::Plain.decode_or_raw("IZZGC3TDMU======"), "IZZGC3TDMU======");
    }
}
