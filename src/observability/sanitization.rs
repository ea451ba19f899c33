use std::fmt;

/// Characters kept visible at each end of a partially redacted value.
pub const VISIBLE_CHARS: usize = 6;

/// A wrapper for secrets that only ever displays a redacted form.
#[derive(Clone)]
pub struct SensitiveData<T> {
    inner: T,
    kind: SensitiveKind,
}

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum SensitiveKind {
    /// bolt11 invoice; prefix and checksum stay readable
    Invoice,
    /// Payment preimage, hex
    Preimage,
    /// Extended private key or nostr secret key
    PrivateKey,
    /// LNURL callback token, which doubles as a capability
    CallbackToken,
    /// HTTP password
    Password,
}

impl SensitiveKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Invoice => "INVOICE",
            Self::Preimage => "PREIMAGE",
            Self::PrivateKey => "PRIVATE_KEY",
            Self::CallbackToken => "TOKEN",
            Self::Password => "PASSWORD",
        }
    }

    fn fully_hidden(&self) -> bool {
        matches!(self, Self::PrivateKey | Self::Password)
    }
}

impl<T: fmt::Display> SensitiveData<T> {
    pub fn new(inner: T, kind: SensitiveKind) -> Self {
        Self { inner, kind }
    }

    fn redacted(&self) -> String {
        let original = self.inner.to_string();
        let len = original.chars().count();

        if self.kind.fully_hidden() || len <= VISIBLE_CHARS * 2 {
            return format!("[REDACTED_{}]", self.kind.label());
        }

        let start: String = original.chars().take(VISIBLE_CHARS).collect();
        let end: String = original.chars().skip(len - VISIBLE_CHARS).collect();
        format!(
            "{}[REDACTED_{}_{}_CHARS]{}",
            start,
            self.kind.label(),
            len - VISIBLE_CHARS * 2,
            end
        )
    }
}

impl<T: fmt::Display> fmt::Display for SensitiveData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl<T: fmt::Display> fmt::Debug for SensitiveData<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

pub fn sanitize_invoice<T: fmt::Display>(invoice: T) -> SensitiveData<T> {
    SensitiveData::new(invoice, SensitiveKind::Invoice)
}

pub fn sanitize_preimage<T: fmt::Display>(preimage: T) -> SensitiveData<T> {
    SensitiveData::new(preimage, SensitiveKind::Preimage)
}

pub fn sanitize_private_key<T: fmt::Display>(key: T) -> SensitiveData<T> {
    SensitiveData::new(key, SensitiveKind::PrivateKey)
}

pub fn sanitize_token<T: fmt::Display>(token: T) -> SensitiveData<T> {
    SensitiveData::new(token, SensitiveKind::CallbackToken)
}

pub fn sanitize_password<T: fmt::Display>(password: T) -> SensitiveData<T> {
    SensitiveData::new(password, SensitiveKind::Password)
}
