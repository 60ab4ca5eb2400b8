//! Typed extractors that hand handlers validated values.
//!
//! Each extractor runs the matching `parse_*` operation; rejections render
//! through [`RequestError`]'s [`actix_web::ResponseError`] implementation.

use std::ops::{Deref, DerefMut};

use actix_web::dev::Payload;
use actix_web::web::Bytes;
use actix_web::{FromRequest, HttpRequest};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use serde::de::DeserializeOwned;

use super::Validated;
use super::pipeline::{
    Location, RequestError, parse_body, parse_headers, parse_params, parse_query,
};

macro_rules! validated_extractor {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $name<T>(pub T);

        impl<T> $name<T> {
            /// Unwrap the validated value.
            pub fn into_inner(self) -> T {
                self.0
            }
        }

        impl<T> Deref for $name<T> {
            type Target = T;

            fn deref(&self) -> &T {
                &self.0
            }
        }

        impl<T> DerefMut for $name<T> {
            fn deref_mut(&mut self) -> &mut T {
                &mut self.0
            }
        }
    };
}

validated_extractor!(
    /// Validated request body (JSON or URL-encoded form).
    ValidBody
);
validated_extractor!(
    /// Validated query string.
    ValidQuery
);
validated_extractor!(
    /// Validated path parameters.
    ValidParams
);
validated_extractor!(
    /// Validated request headers.
    ValidHeaders
);

impl<T> FromRequest for ValidBody<T>
where
    T: DeserializeOwned + Validated + 'static,
{
    type Error = RequestError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        let body = Bytes::from_request(&req, payload);
        Box::pin(async move {
            let bytes = body.await.map_err(|err| RequestError::Parse {
                location: Location::Body,
                cause: err.to_string(),
            })?;
            parse_body(&req, &bytes).map(Self)
        })
    }
}

impl<T> FromRequest for ValidQuery<T>
where
    T: DeserializeOwned + Validated,
{
    type Error = RequestError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(parse_query(req).map(Self))
    }
}

impl<T> FromRequest for ValidParams<T>
where
    T: DeserializeOwned + Validated,
{
    type Error = RequestError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(parse_params(req).map(Self))
    }
}

impl<T> FromRequest for ValidHeaders<T>
where
    T: DeserializeOwned + Validated,
{
    type Error = RequestError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(parse_headers(req).map(Self))
    }
}
