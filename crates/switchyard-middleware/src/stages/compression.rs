//! Response compression.
//!
//! Compresses response bodies with gzip, brotli or deflate, negotiated from
//! the request's `Accept-Encoding` header. Bodies below the configured minimum
//! size are passed through, as is every response to a request carrying the
//! `x-no-compression` header.
//!
//! ```ignore
//! use switchyard_middleware::stages::{CompressionLevel, CompressionMiddleware};
//!
//! let compression = CompressionMiddleware::builder()
//!     .min_size(2048)
//!     .level(CompressionLevel::Fast)
//!     .build();
//! ```

use bytes::Bytes;
use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression as GzCompression;
use http::{header, HeaderValue};
use http_body_util::Full;
use std::io::Write;
use switchyard_core::{BoxFuture, Middleware, Next, Request, RequestContext, Response};

/// Request header that disables compression for that request.
pub const NO_COMPRESSION_HEADER: &str = "x-no-compression";

/// Default minimum body size, in bytes, eligible for compression.
pub const DEFAULT_MIN_SIZE: usize = 1024;

/// Compression algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// Gzip (RFC 1952).
    Gzip,
    /// Brotli (RFC 7932).
    Brotli,
    /// Deflate (RFC 1951).
    Deflate,
    /// No compression.
    Identity,
}

impl Algorithm {
    /// Returns the `Content-Encoding` value for this algorithm.
    #[must_use]
    pub const fn encoding_name(&self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Brotli => "br",
            Self::Deflate => "deflate",
            Self::Identity => "identity",
        }
    }

    /// Parses an algorithm from its encoding token.
    #[must_use]
    pub fn from_encoding(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gzip" | "x-gzip" => Some(Self::Gzip),
            "br" => Some(Self::Brotli),
            "deflate" => Some(Self::Deflate),
            "identity" => Some(Self::Identity),
            _ => None,
        }
    }
}

/// Compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    /// Fastest, lowest ratio.
    Fast,
    /// Balanced.
    #[default]
    Default,
    /// Best ratio, slowest.
    Best,
}

impl CompressionLevel {
    fn to_flate(self) -> GzCompression {
        match self {
            Self::Fast => GzCompression::fast(),
            Self::Default => GzCompression::default(),
            Self::Best => GzCompression::best(),
        }
    }

    const fn to_brotli_quality(self) -> i32 {
        match self {
            Self::Fast => 1,
            Self::Default => 6,
            Self::Best => 11,
        }
    }
}

/// Compression middleware.
///
/// Reads `Accept-Encoding` and `x-no-compression`; writes `Content-Encoding`
/// and `Vary: Accept-Encoding`; drops `Content-Length` after compressing.
#[derive(Debug, Clone)]
pub struct CompressionMiddleware {
    algorithms: Vec<Algorithm>,
    min_size: usize,
    level: CompressionLevel,
}

impl Default for CompressionMiddleware {
    fn default() -> Self {
        Self {
            algorithms: vec![Algorithm::Brotli, Algorithm::Gzip, Algorithm::Deflate],
            min_size: DEFAULT_MIN_SIZE,
            level: CompressionLevel::Default,
        }
    }
}

impl CompressionMiddleware {
    /// Creates compression middleware with the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder.
    #[must_use]
    pub fn builder() -> CompressionBuilder {
        CompressionBuilder::default()
    }

    /// Returns the minimum body size eligible for compression.
    #[must_use]
    pub const fn min_size(&self) -> usize {
        self.min_size
    }

    /// Parses `Accept-Encoding` into algorithms ordered by quality, highest first.
    fn parse_accept_encoding(value: &str) -> Vec<(Algorithm, f32)> {
        let mut encodings: Vec<(Algorithm, f32)> = value
            .split(',')
            .filter_map(|part| {
                let mut pieces = part.trim().split(';');
                let algorithm = Algorithm::from_encoding(pieces.next()?)?;
                let quality = pieces
                    .filter_map(|p| p.trim().strip_prefix("q="))
                    .find_map(|q| q.trim().parse::<f32>().ok())
                    .map_or(1.0, |q| q.clamp(0.0, 1.0));
                Some((algorithm, quality))
            })
            .collect();

        // Stable sort keeps the client's order among equal qualities.
        encodings.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        encodings
    }

    fn select_algorithm(&self, accept_encoding: &str) -> Option<Algorithm> {
        for (algorithm, quality) in Self::parse_accept_encoding(accept_encoding) {
            if quality <= 0.0 {
                continue;
            }
            if algorithm == Algorithm::Identity {
                return None;
            }
            if self.algorithms.contains(&algorithm) {
                return Some(algorithm);
            }
        }
        None
    }

    fn compress(&self, data: &[u8], algorithm: Algorithm) -> std::io::Result<Vec<u8>> {
        match algorithm {
            Algorithm::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), self.level.to_flate());
                encoder.write_all(data)?;
                encoder.finish()
            }
            Algorithm::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), self.level.to_flate());
                encoder.write_all(data)?;
                encoder.finish()
            }
            Algorithm::Brotli => {
                let mut output = Vec::new();
                let params = brotli::enc::BrotliEncoderParams {
                    quality: self.level.to_brotli_quality(),
                    ..Default::default()
                };
                brotli::BrotliCompress(&mut std::io::Cursor::new(data), &mut output, &params)?;
                Ok(output)
            }
            Algorithm::Identity => Ok(data.to_vec()),
        }
    }
}

impl Middleware for CompressionMiddleware {
    fn name(&self) -> &'static str {
        "compression"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let bypass = request.headers().contains_key(NO_COMPRESSION_HEADER);
            let algorithm = if bypass {
                None
            } else {
                request
                    .headers()
                    .get(header::ACCEPT_ENCODING)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|ae| self.select_algorithm(ae))
            };

            let mut response = next.run(ctx, request).await;
            response
                .headers_mut()
                .append(header::VARY, HeaderValue::from_static("Accept-Encoding"));

            let Some(algorithm) = algorithm else {
                return response;
            };
            if response.headers().contains_key(header::CONTENT_ENCODING) {
                return response;
            }

            let (parts, body) = response.into_parts();
            let body_bytes = match http_body_util::BodyExt::collect(body).await {
                Ok(collected) => collected.to_bytes(),
                Err(never) => match never {},
            };

            if body_bytes.len() < self.min_size {
                return Response::from_parts(parts, Full::new(body_bytes));
            }

            let compressed = match self.compress(&body_bytes, algorithm) {
                Ok(data) if data.len() < body_bytes.len() => data,
                _ => return Response::from_parts(parts, Full::new(body_bytes)),
            };

            let mut response = Response::from_parts(parts, Full::new(Bytes::from(compressed)));
            response.headers_mut().insert(
                header::CONTENT_ENCODING,
                HeaderValue::from_static(algorithm.encoding_name()),
            );
            response.headers_mut().remove(header::CONTENT_LENGTH);
            response
        })
    }
}

/// Builder for [`CompressionMiddleware`].
#[derive(Debug, Clone, Default)]
pub struct CompressionBuilder {
    inner: CompressionMiddleware,
}

impl CompressionBuilder {
    /// Sets the enabled algorithms. Default: brotli, gzip, deflate.
    #[must_use]
    pub fn algorithms(mut self, algorithms: impl IntoIterator<Item = Algorithm>) -> Self {
        self.inner.algorithms = algorithms.into_iter().collect();
        self
    }

    /// Sets the minimum body size to compress. Default: 1024 bytes.
    #[must_use]
    pub const fn min_size(mut self, min_size: usize) -> Self {
        self.inner.min_size = min_size;
        self
    }

    /// Sets the compression level.
    #[must_use]
    pub const fn level(mut self, level: CompressionLevel) -> Self {
        self.inner.level = level;
        self
    }

    /// Builds the middleware.
    #[must_use]
    pub fn build(self) -> CompressionMiddleware {
        self.inner
    }
}
