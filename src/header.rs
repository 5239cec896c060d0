//! IP header parsing.
//!
//! Generalizes the teacher crate's `codec::frame::DataFrame` accessors
//! (which only handled IPv4, and returned formatted strings) into a single
//! parser covering both IPv4 and IPv6, returning owned [`IpAddr`] values, per
//! spec.md §4.6 / §3.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error as ThisError;

const MIN_HEADER_LEN: usize = 20;

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum HeaderError {
    #[error("small packet: need at least {MIN_HEADER_LEN} bytes, got {0}")]
    SmallPacket(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpHeader {
    pub version: u8,
    pub src: IpAddr,
    pub dst: IpAddr,
}

/// Parses the version, source and destination addresses out of the leading
/// bytes of an IP packet.
///
/// IPv4: source at offset 12..16, destination at 16..20.
/// IPv6: source at offset 8..24, destination at 24..40.
/// Any buffer shorter than 20 bytes fails with [`HeaderError::SmallPacket`].
pub fn parse(buf: &[u8]) -> Result<IpHeader, HeaderError> {
    if buf.len() < MIN_HEADER_LEN {
        return Err(HeaderError::SmallPacket(buf.len()));
    }

    let version = buf[0] >> 4;

    if version == 4 {
        let src = Ipv4Addr::new(buf[12], buf[13], buf[14], buf[15]);
        let dst = Ipv4Addr::new(buf[16], buf[17], buf[18], buf[19]);
        return Ok(IpHeader {
            version,
            src: IpAddr::V4(src),
            dst: IpAddr::V4(dst),
        });
    }

    if buf.len() < 40 {
        return Err(HeaderError::SmallPacket(buf.len()));
    }

    let mut src_octets = [0u8; 16];
    src_octets.copy_from_slice(&buf[8..24]);
    let mut dst_octets = [0u8; 16];
    dst_octets.copy_from_slice(&buf[24..40]);

    Ok(IpHeader {
        version,
        src: IpAddr::V6(Ipv6Addr::from(src_octets)),
        dst: IpAddr::V6(Ipv6Addr::from(dst_octets)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ipv4_header() {
        // 45 00 00 4b 08 f8 00 00 3e 11 82 91 c0 e5 d8 8f c0 e5 96 be ...
        let buf: Vec<u8> = vec![
            0x45, 0x00, 0x00, 0x4b, 0x08, 0xf8, 0x00, 0x00, 0x3e, 0x11, 0x82, 0x91, 0xc0, 0xe5,
            0xd8, 0x8f, 0xc0, 0xe5, 0x96, 0xbe,
        ];
        let header = parse(&buf).unwrap();
        assert_eq!(header.version, 4);
        assert_eq!(header.src, "192.229.216.143".parse::<IpAddr>().unwrap());
        assert_eq!(header.dst, "192.229.150.190".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn rejects_short_buffer() {
        let buf = vec![0x45; 19];
        assert_eq!(parse(&buf), Err(HeaderError::SmallPacket(19)));
    }

    #[test]
    fn parses_ipv6_header() {
        let mut buf = vec![0u8; 40];
        buf[0] = 0x60;
        for (i, b) in buf[8..24].iter_mut().enumerate() {
            *b = i as u8;
        }
        for (i, b) in buf[24..40].iter_mut().enumerate() {
            *b = 0x10 + i as u8;
        }
        let header = parse(&buf).unwrap();
        assert_eq!(header.version, 6);
        assert!(matches!(header.src, IpAddr::V6(_)));
        assert!(matches!(header.dst, IpAddr::V6(_)));
    }
}
