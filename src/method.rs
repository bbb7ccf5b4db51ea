//! HTTP method as a typed enum.
//!
//! Route keys spell the verb in lowercase (`get_users_$id`), so parsing here
//! accepts the lowercase key token; `as_str` returns the uppercase wire form
//! used to match incoming requests.

use std::fmt;
use std::str::FromStr;

/// A known HTTP method. Covers the RFC 9110 standard set.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Connect,
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
    Trace,
}

impl Method {
    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Delete  => "DELETE",
            Self::Get     => "GET",
            Self::Head    => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch   => "PATCH",
            Self::Post    => "POST",
            Self::Put     => "PUT",
            Self::Trace   => "TRACE",
        }
    }

    /// Parses the lowercase verb token that leads a route key
    /// (`"get"` in `"get_users_$id"`).
    pub(crate) fn from_key_token(token: &str) -> Option<Self> {
        match token {
            "connect" => Some(Self::Connect),
            "delete"  => Some(Self::Delete),
            "get"     => Some(Self::Get),
            "head"    => Some(Self::Head),
            "options" => Some(Self::Options),
            "patch"   => Some(Self::Patch),
            "post"    => Some(Self::Post),
            "put"     => Some(Self::Put),
            "trace"   => Some(Self::Trace),
            _         => None,
        }
    }
}

/// Parses an uppercase method string (e.g. `"GET"`). Case-sensitive per RFC 9110 §9.1.
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(Self::Connect),
            "DELETE"  => Ok(Self::Delete),
            "GET"     => Ok(Self::Get),
            "HEAD"    => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "PATCH"   => Ok(Self::Patch),
            "POST"    => Ok(Self::Post),
            "PUT"     => Ok(Self::Put),
            "TRACE"   => Ok(Self::Trace),
            _         => Err(()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
