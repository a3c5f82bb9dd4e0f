/* Copyright (c) Fortanix, Inc.
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Constants and structures related to the Intel SGX ISA extension.
//!
//! These are taken directly from the [Intel Software Developer's Manual][isdm],
//! volume 3, chapters 37–43.
//!
//! Structures are plain Rust values. The architectural byte layout is only
//! ever produced or consumed through the `to_bytes`/`from_bytes` functions of
//! each structure, never by reinterpreting memory.
//!
//! [isdm]: https://www-ssl.intel.com/content/www/us/en/processors/architectures-software-developer-manuals.html

#![cfg_attr(not(test), no_std)]
#![doc(html_logo_url = "https://edp.fortanix.com/img/docs/edp-logo.svg",
       html_favicon_url = "https://edp.fortanix.com/favicon.ico",
       html_root_url = "https://edp.fortanix.com/docs/api/")]

use bitflags::bitflags;
use byteorder::{ByteOrder, LE};

#[cfg(all(target_arch = "x86_64", target_env = "sgx"))]
pub mod arch;
pub mod hardware;

macro_rules! enum_def {
    (
        #[derive($($derive:meta),*)]
        #[repr($repr:ident)]
        pub enum $name:ident {
            $($key:ident = $val:expr,)*
        }
    ) => (
        #[derive($($derive),*)]
        #[repr($repr)]
        pub enum $name {
            $($key = $val,)*
        }

        impl $name {
            pub fn from_repr(v: $repr) -> Option<Self> {
                match v {
                    $($val => Some($name::$key),)*
                    _ => None,
                }
            }
        }
    )
}

enum_def! {
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
#[repr(u32)]
pub enum Enclu {
    EReport     = 0,
    EGetkey     = 1,
    EEnter      = 2,
    EResume     = 3,
    EExit       = 4,
}
}

enum_def! {
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success                =   0,
    InvalidSigStruct       =   1,
    InvalidAttribute       =   2,
    InvalidMeasurement     =   4,
    InvalidSignature       =   8,
    InvalidEinitToken      =  16,
    InvalidCpusvn          =  32,
    InvalidIsvsvn          =  64,
    UnmaskedEvent          = 128,
    InvalidKeyname         = 256,
}
}

enum_def! {
#[derive(Clone,Copy,Debug,PartialEq,Eq)]
#[repr(u16)]
pub enum Keyname {
    EinitToken    = 0,
    Provision     = 1,
    ProvisionSeal = 2,
    Report        = 3,
    Seal          = 4,
}
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct AttributesFlags: u64 {
        const INIT          = 0b0000_0001;
        const DEBUG         = 0b0000_0010;
        const MODE64BIT     = 0b0000_0100;
        const PROVISIONKEY  = 0b0001_0000;
        const EINITTOKENKEY = 0b0010_0000;
        const CET           = 0b0100_0000;
        const KSS           = 0b1000_0000;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Miscselect: u32 {
        const EXINFO = 0b0000_0001;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Keypolicy: u16 {
        const MRENCLAVE = 0b0000_0001;
        const MRSIGNER  = 0b0000_0010;
    }
}

/// Reads fixed-width fields off the front of an architectural structure.
struct FieldReader<'a> {
    buf: &'a [u8],
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        FieldReader { buf }
    }

    fn array<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        let (head, tail) = self.buf.split_at(N);
        out.copy_from_slice(head);
        self.buf = tail;
        out
    }

    fn u16(&mut self) -> u16 {
        LE::read_u16(&self.array::<2>())
    }

    fn u32(&mut self) -> u32 {
        LE::read_u32(&self.array::<4>())
    }

    fn u64(&mut self) -> u64 {
        LE::read_u64(&self.array::<8>())
    }

    fn attributes(&mut self) -> Attributes {
        let flags = AttributesFlags::from_bits_retain(self.u64());
        let xfrm = self.u64();
        Attributes { flags, xfrm }
    }
}

/// Writes fixed-width fields into an architectural structure, front to back.
struct FieldWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> FieldWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        FieldWriter { buf, pos: 0 }
    }

    fn bytes(&mut self, data: &[u8]) {
        self.buf[self.pos..self.pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
    }

    fn u16(&mut self, v: u16) {
        let mut b = [0u8; 2];
        LE::write_u16(&mut b, v);
        self.bytes(&b);
    }

    fn u32(&mut self, v: u32) {
        let mut b = [0u8; 4];
        LE::write_u32(&mut b, v);
        self.bytes(&b);
    }

    fn u64(&mut self, v: u64) {
        let mut b = [0u8; 8];
        LE::write_u64(&mut b, v);
        self.bytes(&b);
    }

    fn attributes(&mut self, a: &Attributes) {
        self.u64(a.flags.bits());
        self.u64(a.xfrm);
    }

    fn finish(self) {
        debug_assert_eq!(self.pos, self.buf.len());
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Attributes {
    pub flags: AttributesFlags,
    pub xfrm: u64,
}

impl Attributes {
    pub const UNPADDED_SIZE: usize = 16;

    pub fn from_bytes(bytes: &[u8; Self::UNPADDED_SIZE]) -> Self {
        FieldReader::new(bytes).attributes()
    }

    pub fn to_bytes(&self) -> [u8; Self::UNPADDED_SIZE] {
        let mut out = [0u8; Self::UNPADDED_SIZE];
        let mut w = FieldWriter::new(&mut out);
        w.attributes(self);
        w.finish();
        out
    }

    /// Bitwise AND of both words, used to apply an attribute match mask.
    pub fn masked(&self, mask: &Attributes) -> Attributes {
        Attributes {
            flags: AttributesFlags::from_bits_retain(self.flags.bits() & mask.flags.bits()),
            xfrm: self.xfrm & mask.xfrm,
        }
    }
}

/// The body of a `REPORT`, covered by the report MAC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportBody {
    pub cpusvn:     [u8; 16],
    pub miscselect: Miscselect,
    pub _reserved1: [u8; 28],
    pub attributes: Attributes,
    pub mrenclave:  [u8; 32],
    pub _reserved2: [u8; 32],
    pub mrsigner:   [u8; 32],
    pub _reserved3: [u8; 96],
    pub isvprodid:  u16,
    pub isvsvn:     u16,
    pub _reserved4: [u8; 60],
    pub reportdata: [u8; 64],
}

impl ReportBody {
    pub const UNPADDED_SIZE: usize = 384;

    fn read(r: &mut FieldReader) -> Self {
        ReportBody {
            cpusvn: r.array(),
            miscselect: Miscselect::from_bits_retain(r.u32()),
            _reserved1: r.array(),
            attributes: r.attributes(),
            mrenclave: r.array(),
            _reserved2: r.array(),
            mrsigner: r.array(),
            _reserved3: r.array(),
            isvprodid: r.u16(),
            isvsvn: r.u16(),
            _reserved4: r.array(),
            reportdata: r.array(),
        }
    }

    fn write(&self, w: &mut FieldWriter) {
        w.bytes(&self.cpusvn);
        w.u32(self.miscselect.bits());
        w.bytes(&self._reserved1);
        w.attributes(&self.attributes);
        w.bytes(&self.mrenclave);
        w.bytes(&self._reserved2);
        w.bytes(&self.mrsigner);
        w.bytes(&self._reserved3);
        w.u16(self.isvprodid);
        w.u16(self.isvsvn);
        w.bytes(&self._reserved4);
        w.bytes(&self.reportdata);
    }

    pub fn from_bytes(bytes: &[u8; Self::UNPADDED_SIZE]) -> Self {
        Self::read(&mut FieldReader::new(bytes))
    }

    pub fn try_copy_from(src: &[u8]) -> Option<Self> {
        if src.len() != Self::UNPADDED_SIZE {
            return None;
        }
        Some(Self::read(&mut FieldReader::new(src)))
    }

    pub fn to_bytes(&self) -> [u8; Self::UNPADDED_SIZE] {
        let mut out = [0u8; Self::UNPADDED_SIZE];
        let mut w = FieldWriter::new(&mut out);
        self.write(&mut w);
        w.finish();
        out
    }
}

impl Default for ReportBody {
    fn default() -> Self {
        Self::from_bytes(&[0; Self::UNPADDED_SIZE])
    }
}

/// `REPORT`, the output of `EREPORT`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub body:  ReportBody,
    pub keyid: [u8; 32],
    pub mac:   [u8; 16],
}

impl Report {
    pub const UNPADDED_SIZE: usize = 432;

    pub fn from_bytes(bytes: &[u8; Self::UNPADDED_SIZE]) -> Self {
        let mut r = FieldReader::new(bytes);
        Report {
            body: ReportBody::read(&mut r),
            keyid: r.array(),
            mac: r.array(),
        }
    }

    /// Decodes a report from a slice. Returns `None` unless `src` has exactly
    /// the architectural size.
    pub fn try_copy_from(src: &[u8]) -> Option<Self> {
        if src.len() != Self::UNPADDED_SIZE {
            return None;
        }
        let mut bytes = [0u8; Self::UNPADDED_SIZE];
        bytes.copy_from_slice(src);
        Some(Self::from_bytes(&bytes))
    }

    pub fn to_bytes(&self) -> [u8; Self::UNPADDED_SIZE] {
        let mut out = [0u8; Self::UNPADDED_SIZE];
        let mut w = FieldWriter::new(&mut out);
        self.body.write(&mut w);
        w.bytes(&self.keyid);
        w.bytes(&self.mac);
        w.finish();
        out
    }
}

impl Default for Report {
    fn default() -> Self {
        Self::from_bytes(&[0; Self::UNPADDED_SIZE])
    }
}

/// `TARGETINFO`, naming the enclave a `REPORT` is destined for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Targetinfo {
    pub measurement: [u8; 32],
    pub attributes:  Attributes,
    pub _reserved1:  [u8; 4],
    pub miscselect:  Miscselect,
    pub _reserved2:  [u8; 456],
}

impl Targetinfo {
    pub const UNPADDED_SIZE: usize = 512;

    pub fn from_bytes(bytes: &[u8; Self::UNPADDED_SIZE]) -> Self {
        let mut r = FieldReader::new(bytes);
        Targetinfo {
            measurement: r.array(),
            attributes: r.attributes(),
            _reserved1: r.array(),
            miscselect: Miscselect::from_bits_retain(r.u32()),
            _reserved2: r.array(),
        }
    }

    pub fn try_copy_from(src: &[u8]) -> Option<Self> {
        if src.len() != Self::UNPADDED_SIZE {
            return None;
        }
        let mut bytes = [0u8; Self::UNPADDED_SIZE];
        bytes.copy_from_slice(src);
        Some(Self::from_bytes(&bytes))
    }

    pub fn to_bytes(&self) -> [u8; Self::UNPADDED_SIZE] {
        let mut out = [0u8; Self::UNPADDED_SIZE];
        let mut w = FieldWriter::new(&mut out);
        w.bytes(&self.measurement);
        w.attributes(&self.attributes);
        w.bytes(&self._reserved1);
        w.u32(self.miscselect.bits());
        w.bytes(&self._reserved2);
        w.finish();
        out
    }
}

impl Default for Targetinfo {
    fn default() -> Self {
        Self::from_bytes(&[0; Self::UNPADDED_SIZE])
    }
}

impl From<&Report> for Targetinfo {
    fn from(r: &Report) -> Targetinfo {
        Targetinfo {
            measurement: r.body.mrenclave,
            attributes: r.body.attributes,
            miscselect: r.body.miscselect,
            ..Targetinfo::default()
        }
    }
}

/// `KEYREQUEST`, the input of `EGETKEY`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Keyrequest {
    pub keyname:       u16,
    pub keypolicy:     Keypolicy,
    pub isvsvn:        u16,
    pub _reserved1:    u16,
    pub cpusvn:        [u8; 16],
    pub attributemask: Attributes,
    pub keyid:         [u8; 32],
    pub miscmask:      u32,
    pub _reserved2:    [u8; 436],
}

impl Keyrequest {
    pub const UNPADDED_SIZE: usize = 512;

    pub fn from_bytes(bytes: &[u8; Self::UNPADDED_SIZE]) -> Self {
        let mut r = FieldReader::new(bytes);
        Keyrequest {
            keyname: r.u16(),
            keypolicy: Keypolicy::from_bits_retain(r.u16()),
            isvsvn: r.u16(),
            _reserved1: r.u16(),
            cpusvn: r.array(),
            attributemask: r.attributes(),
            keyid: r.array(),
            miscmask: r.u32(),
            _reserved2: r.array(),
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::UNPADDED_SIZE] {
        let mut out = [0u8; Self::UNPADDED_SIZE];
        let mut w = FieldWriter::new(&mut out);
        w.u16(self.keyname);
        w.u16(self.keypolicy.bits());
        w.u16(self.isvsvn);
        w.u16(self._reserved1);
        w.bytes(&self.cpusvn);
        w.attributes(&self.attributemask);
        w.bytes(&self.keyid);
        w.u32(self.miscmask);
        w.bytes(&self._reserved2);
        w.finish();
        out
    }
}

impl Default for Keyrequest {
    fn default() -> Self {
        Self::from_bytes(&[0; Self::UNPADDED_SIZE])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq() {
        let mut a = Keyrequest::default();
        let mut b = Keyrequest::default();
        assert!(a == b);

        a.keyname = 22;
        assert!(a != b);

        b.keyname = 22;
        assert!(a == b);

        a.miscmask = 0xdeadbeef;
        assert!(a != b);

        b.miscmask = 0xdeadbeef;
        assert!(a == b);
    }

    #[test]
    fn report_field_offsets() {
        let mut report = Report::default();
        report.body.cpusvn = [0x11; 16];
        report.body.miscselect = Miscselect::EXINFO;
        report.body.attributes = Attributes { flags: AttributesFlags::INIT | AttributesFlags::MODE64BIT, xfrm: 3 };
        report.body.mrenclave = [0x22; 32];
        report.body.mrsigner = [0x33; 32];
        report.body.isvprodid = 0x0102;
        report.body.isvsvn = 0x0304;
        report.body.reportdata = [0x44; 64];
        report.keyid = [0x55; 32];
        report.mac = [0x66; 16];

        let bytes = report.to_bytes();
        assert_eq!(&bytes[0..16], &[0x11; 16]);
        assert_eq!(&bytes[16..20], &[1, 0, 0, 0]);
        assert_eq!(&bytes[48..56], &[5, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[56..64], &[3, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[64..96], &[0x22; 32]);
        assert_eq!(&bytes[128..160], &[0x33; 32]);
        assert_eq!(&bytes[256..260], &[0x02, 0x01, 0x04, 0x03]);
        assert_eq!(&bytes[320..384], &[0x44; 64][..]);
        assert_eq!(&bytes[384..416], &[0x55; 32]);
        assert_eq!(&bytes[416..432], &[0x66; 16]);

        assert_eq!(Report::try_copy_from(&bytes[..]), Some(report));
    }

    #[test]
    fn report_rejects_wrong_size() {
        assert!(Report::try_copy_from(&[0u8; 431]).is_none());
        assert!(Report::try_copy_from(&[0u8; 433]).is_none());
        assert!(ReportBody::try_copy_from(&[0u8; 432]).is_none());
    }

    #[test]
    fn reserved_bytes_survive_decoding() {
        let mut bytes = [0u8; Report::UNPADDED_SIZE];
        bytes[20] = 0xaa;
        bytes[300] = 0xbb;
        let report = Report::from_bytes(&bytes);
        assert_eq!(report.body._reserved1[0], 0xaa);
        assert_eq!(&report.to_bytes()[..], &bytes[..]);
    }

    #[test]
    fn keyrequest_layout() {
        let req = Keyrequest {
            keyname: Keyname::Seal as u16,
            keypolicy: Keypolicy::MRSIGNER,
            isvsvn: 7,
            cpusvn: [0xc0; 16],
            attributemask: Attributes { flags: AttributesFlags::from_bits_retain(!0), xfrm: 0 },
            keyid: [0x0f; 32],
            miscmask: 0xffff_ffff,
            ..Keyrequest::default()
        };
        let bytes = req.to_bytes();
        assert_eq!(&bytes[..8], &hex::decode("0400020007000000").unwrap()[..]);
        assert_eq!(&bytes[8..24], &[0xc0; 16]);
        assert_eq!(&bytes[24..32], &[0xff; 8]);
        assert_eq!(&bytes[32..40], &[0; 8]);
        assert_eq!(&bytes[40..72], &[0x0f; 32]);
        assert_eq!(&bytes[72..76], &[0xff; 4]);
        assert_eq!(Keyrequest::from_bytes(&bytes), req);
    }

    #[test]
    fn targetinfo_from_report() {
        let mut report = Report::default();
        report.body.mrenclave = [9; 32];
        report.body.miscselect = Miscselect::EXINFO;
        let ti = Targetinfo::from(&report);
        let bytes = ti.to_bytes();
        assert_eq!(&bytes[..32], &[9; 32]);
        assert_eq!(&bytes[52..56], &[1, 0, 0, 0]);
        assert_eq!(Targetinfo::try_copy_from(&bytes[..]), Some(ti));
    }

    #[test]
    fn attributes_masking() {
        let a = Attributes { flags: AttributesFlags::DEBUG | AttributesFlags::INIT, xfrm: 0b111 };
        let mask = Attributes { flags: AttributesFlags::INIT, xfrm: 0b101 };
        assert_eq!(a.masked(&mask), Attributes { flags: AttributesFlags::INIT, xfrm: 0b101 });
    }
}
