//! The fixed status table used by the response writer.
//!
//! Only these eight codes have a status-line renderer. Anything else an
//! envelope carries is written as `400 Bad Request`.
//!
//! | Code | Extra header |
//! |---|---|
//! | 200 OK | |
//! | 201 Created | |
//! | 301 Moved Permanently | `Location` from the `location` option |
//! | 304 Not Modified | |
//! | 400 Bad Request | |
//! | 404 Not Found | |
//! | 405 Method Not Allowed | `Allow` from the `method` option |
//! | 500 Internal Server Error | |

/// A status code the writer knows how to render.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    Ok,                  // 200
    Created,             // 201
    MovedPermanently,    // 301
    NotModified,         // 304
    BadRequest,          // 400
    NotFound,            // 404
    MethodNotAllowed,    // 405
    InternalServerError, // 500
}

/// The header a status requires on top of `Content-Type` / `Content-Length`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum RequiredHeader {
    Location,
    Allow,
}

impl Status {
    /// Looks a numeric code up in the table.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            200 => Some(Self::Ok),
            201 => Some(Self::Created),
            301 => Some(Self::MovedPermanently),
            304 => Some(Self::NotModified),
            400 => Some(Self::BadRequest),
            404 => Some(Self::NotFound),
            405 => Some(Self::MethodNotAllowed),
            500 => Some(Self::InternalServerError),
            _   => None,
        }
    }

    /// Like [`Status::from_code`] but with the writer's fallback applied.
    pub fn resolve(code: u16) -> Self {
        Self::from_code(code).unwrap_or(Self::BadRequest)
    }

    pub fn code(self) -> u16 {
        self.into()
    }

    pub fn reason(self) -> &'static str {
        match self {
            Self::Ok                  => "OK",
            Self::Created             => "Created",
            Self::MovedPermanently    => "Moved Permanently",
            Self::NotModified         => "Not Modified",
            Self::BadRequest          => "Bad Request",
            Self::NotFound            => "Not Found",
            Self::MethodNotAllowed    => "Method Not Allowed",
            Self::InternalServerError => "Internal Server Error",
        }
    }

    pub(crate) fn required_header(self) -> Option<RequiredHeader> {
        match self {
            Self::MovedPermanently => Some(RequiredHeader::Location),
            Self::MethodNotAllowed => Some(RequiredHeader::Allow),
            _ => None,
        }
    }
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        match s {
            Status::Ok                  => 200,
            Status::Created             => 201,
            Status::MovedPermanently    => 301,
            Status::NotModified         => 304,
            Status::BadRequest          => 400,
            Status::NotFound            => 404,
            Status::MethodNotAllowed    => 405,
            Status::InternalServerError => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codes_fall_back_to_bad_request() {
        assert_eq!(Status::resolve(418), Status::BadRequest);
        assert_eq!(Status::resolve(204), Status::BadRequest);
        assert_eq!(Status::resolve(201), Status::Created);
    }

    #[test]
    fn redirect_and_method_not_allowed_need_extra_headers() {
        assert_eq!(Status::MovedPermanently.required_header(), Some(RequiredHeader::Location));
        assert_eq!(Status::MethodNotAllowed.required_header(), Some(RequiredHeader::Allow));
        assert_eq!(Status::Ok.required_header(), None);
    }
}
