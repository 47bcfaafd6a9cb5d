//! Canonical binary encoding of manifests.
//!
//! Layout: magic `TMAP`, a big-endian `u16` format version, then six
//! `u32`-length-prefixed sections: header, entities, devices, areas,
//! services, checksum. Strings are `u32`-length-prefixed UTF-8, floats are
//! IEEE-754 bits, optional values carry a one-byte presence tag.
//!
//! Decoding is strict: anything [`encode`] would not have produced is
//! rejected, so a decoded manifest always re-encodes to the same bytes.

use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};

use crate::area::Area;
use crate::descriptor::{AttributeDescriptor, CapabilityRange, FieldKind};
use crate::device::Device;
use crate::entity::{AreaRef, AreaSource, AttributeValue, Entity, ValidationStatus};
use crate::id::{AreaId, DeviceId, EntityId};
use crate::manifest::{Checksum, Manifest, ManifestVersion};
use crate::schema::SchemaVersion;
use crate::service::{Service, ServiceField};
use crate::time;

/// File magic.
pub const MAGIC: &[u8; 4] = b"TMAP";

/// Current binary format version.
pub const FORMAT_VERSION: u16 = 1;

const CHECKSUM_DOMAIN: &[u8] = b"topomap/content/v1";

/// Errors raised while encoding or decoding a binary manifest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("not a manifest: bad magic")]
    BadMagic,
    #[error("unsupported manifest format version {0}")]
    UnsupportedFormat(u16),
    #[error("truncated input while reading {0}")]
    Truncated(&'static str),
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
    #[error("invalid tag {tag} for {what}")]
    InvalidTag { what: &'static str, tag: u8 },
    #[error("{0} trailing bytes after manifest")]
    TrailingBytes(usize),
    #[error("non-canonical {0}")]
    NonCanonical(&'static str),
    #[error("section {0} length does not match its content")]
    SectionLength(&'static str),
    #[error("invalid synthetic id in {0}")]
    InvalidId(&'static str),
    #[error("invalid schema version in header")]
    InvalidSchemaVersion,
    #[error("timestamp out of range")]
    InvalidTimestamp,
    #[error("{0} too long to encode")]
    TooLong(&'static str),
}

#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn len(&mut self, len: usize, what: &'static str) -> Result<(), CodecError> {
        let len = u32::try_from(len).map_err(|_| CodecError::TooLong(what))?;
        self.u32(len);
        Ok(())
    }

    fn bytes(&mut self, bytes: &[u8], what: &'static str) -> Result<(), CodecError> {
        self.len(bytes.len(), what)?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn str(&mut self, value: &str, what: &'static str) -> Result<(), CodecError> {
        self.bytes(value.as_bytes(), what)
    }

    fn opt_str(&mut self, value: Option<&str>, what: &'static str) -> Result<(), CodecError> {
        match value {
            None => self.u8(0),
            Some(value) => {
                self.u8(1);
                self.str(value, what)?;
            }
        }
        Ok(())
    }

    fn flag(&mut self, value: bool) {
        self.u8(u8::from(value));
    }

    fn opt_f64(&mut self, value: Option<f64>) {
        match value {
            None => self.u8(0),
            Some(value) => {
                self.u8(1);
                self.u64(value.to_bits());
            }
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], CodecError> {
        if self.buf.len() < n {
            return Err(CodecError::Truncated(what));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], CodecError> {
        let bytes = self.take(N, what)?;
        let mut out = [0_u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, CodecError> {
        Ok(self.array::<1>(what)?[0])
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, CodecError> {
        self.array(what).map(u16::from_be_bytes)
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, CodecError> {
        self.array(what).map(u32::from_be_bytes)
    }

    fn u64(&mut self, what: &'static str) -> Result<u64, CodecError> {
        self.array(what).map(u64::from_be_bytes)
    }

    fn i64(&mut self, what: &'static str) -> Result<i64, CodecError> {
        self.array(what).map(i64::from_be_bytes)
    }

    fn len(&mut self, what: &'static str) -> Result<usize, CodecError> {
        let len = self.u32(what)?;
        usize::try_from(len).map_err(|_| CodecError::Truncated(what))
    }

    fn str(&mut self, what: &'static str) -> Result<String, CodecError> {
        let len = self.len(what)?;
        let bytes = self.take(len, what)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8(what))
    }

    fn opt_str(&mut self, what: &'static str) -> Result<Option<String>, CodecError> {
        match self.u8(what)? {
            0 => Ok(None),
            1 => self.str(what).map(Some),
            tag => Err(CodecError::InvalidTag { what, tag }),
        }
    }

    fn flag(&mut self, what: &'static str) -> Result<bool, CodecError> {
        match self.u8(what)? {
            0 => Ok(false),
            1 => Ok(true),
            tag => Err(CodecError::InvalidTag { what, tag }),
        }
    }

    fn opt_f64(&mut self, what: &'static str) -> Result<Option<f64>, CodecError> {
        match self.u8(what)? {
            0 => Ok(None),
            1 => {
                let value = f64::from_bits(self.u64(what)?);
                if value.is_finite() {
                    Ok(Some(value))
                } else {
                    Err(CodecError::NonCanonical(what))
                }
            }
            tag => Err(CodecError::InvalidTag { what, tag }),
        }
    }

    fn id<T: std::str::FromStr>(&mut self, what: &'static str) -> Result<T, CodecError> {
        self.str(what)?
            .parse()
            .map_err(|_| CodecError::InvalidId(what))
    }

    fn opt_id<T: std::str::FromStr>(&mut self, what: &'static str) -> Result<Option<T>, CodecError> {
        self.opt_str(what)?
            .map(|value| value.parse().map_err(|_| CodecError::InvalidId(what)))
            .transpose()
    }

    fn section(&mut self, what: &'static str) -> Result<Reader<'a>, CodecError> {
        let len = self.len(what)?;
        let body = self.take(len, what)?;
        Ok(Reader::new(body))
    }

    fn finish(self, what: &'static str) -> Result<(), CodecError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(CodecError::SectionLength(what))
        }
    }
}

fn ensure_ascending<T: Ord>(items: &[T], what: &'static str) -> Result<(), CodecError> {
    if items.windows(2).all(|w| w[0] < w[1]) {
        Ok(())
    } else {
        Err(CodecError::NonCanonical(what))
    }
}

fn encode_entities(entities: &[Entity]) -> Result<Vec<u8>, CodecError> {
    let mut w = Writer::default();
    w.len(entities.len(), "entity count")?;
    for entity in entities {
        w.str(entity.id.as_str(), "entity id")?;
        w.str(&entity.platform_id, "entity platform id")?;
        w.str(&entity.domain, "entity domain")?;
        w.opt_str(entity.name.as_deref(), "entity name")?;
        w.opt_str(entity.device_id.as_ref().map(DeviceId::as_str), "entity device")?;
        match &entity.area {
            None => w.u8(0),
            Some(area) => {
                w.u8(match area.source {
                    AreaSource::Direct => 1,
                    AreaSource::Device => 2,
                });
                w.str(area.id.as_str(), "entity area")?;
            }
        }
        w.opt_str(entity.device_class.as_deref(), "entity device class")?;
        w.len(entity.attributes.len(), "attribute count")?;
        for (key, value) in &entity.attributes {
            w.str(key, "attribute key")?;
            match value {
                AttributeValue::Bool(value) => {
                    w.u8(0);
                    w.u8(u8::from(*value));
                }
                AttributeValue::Int(value) => {
                    w.u8(1);
                    w.i64(*value);
                }
                AttributeValue::Float(value) => {
                    w.u8(2);
                    w.u64(value.to_bits());
                }
                AttributeValue::String(value) => {
                    w.u8(3);
                    w.str(value, "attribute value")?;
                }
            }
        }
        w.len(entity.descriptors.len(), "descriptor count")?;
        for (name, descriptor) in &entity.descriptors {
            w.str(name, "descriptor name")?;
            encode_descriptor(&mut w, descriptor)?;
        }
        w.len(entity.capabilities.len(), "capability count")?;
        for capability in &entity.capabilities {
            w.str(capability, "capability")?;
        }
        w.u8(match entity.status {
            ValidationStatus::Valid => 0,
            ValidationStatus::ValidWithWarnings => 1,
            ValidationStatus::Rejected => 2,
        });
    }
    Ok(w.into_bytes())
}

fn encode_descriptor(w: &mut Writer, descriptor: &AttributeDescriptor) -> Result<(), CodecError> {
    w.u8(descriptor.kind.code());
    w.opt_str(descriptor.unit.as_deref(), "descriptor unit")?;
    w.flag(descriptor.optional);
    w.len(descriptor.values.len(), "enum value count")?;
    for value in &descriptor.values {
        w.str(value, "enum value")?;
    }
    match &descriptor.range {
        None => w.u8(0),
        Some(range) => {
            w.u8(1);
            w.opt_f64(range.min);
            w.opt_f64(range.max);
            w.opt_f64(range.step);
        }
    }
    Ok(())
}

fn encode_services(services: &[Service]) -> Result<Vec<u8>, CodecError> {
    let mut w = Writer::default();
    w.len(services.len(), "service count")?;
    for service in services {
        w.str(&service.domain, "service domain")?;
        w.str(&service.name, "service name")?;
        w.len(service.fields.len(), "service field count")?;
        for (name, field) in &service.fields {
            w.str(name, "service field name")?;
            w.opt_str(field.kind.as_deref(), "service field type")?;
            w.opt_str(field.unit.as_deref(), "service field unit")?;
            w.flag(field.required);
        }
    }
    Ok(w.into_bytes())
}

fn encode_devices(devices: &[Device]) -> Result<Vec<u8>, CodecError> {
    let mut w = Writer::default();
    w.len(devices.len(), "device count")?;
    for device in devices {
        w.str(device.id.as_str(), "device id")?;
        w.str(&device.platform_id, "device platform id")?;
        w.str(&device.name, "device name")?;
        w.opt_str(device.area_id.as_ref().map(AreaId::as_str), "device area")?;
        w.opt_str(device.manufacturer.as_deref(), "device manufacturer")?;
        w.opt_str(device.model.as_deref(), "device model")?;
    }
    Ok(w.into_bytes())
}

fn encode_areas(areas: &[Area]) -> Result<Vec<u8>, CodecError> {
    let mut w = Writer::default();
    w.len(areas.len(), "area count")?;
    for area in areas {
        w.str(area.id.as_str(), "area id")?;
        w.str(&area.platform_id, "area platform id")?;
        w.str(&area.name, "area name")?;
        w.opt_str(area.parent_id.as_ref().map(AreaId::as_str), "area parent")?;
    }
    Ok(w.into_bytes())
}

fn decode_entities(mut r: Reader<'_>) -> Result<Vec<Entity>, CodecError> {
    let count = r.len("entity count")?;
    let mut entities = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        let id: EntityId = r.id("entity id")?;
        let platform_id = r.str("entity platform id")?;
        let domain = r.str("entity domain")?;
        let name = r.opt_str("entity name")?;
        let device_id = r.opt_id::<DeviceId>("entity device")?;
        let area = match r.u8("entity area")? {
            0 => None,
            tag @ (1 | 2) => Some(AreaRef {
                id: r.id("entity area")?,
                source: if tag == 1 {
                    AreaSource::Direct
                } else {
                    AreaSource::Device
                },
            }),
            tag => {
                return Err(CodecError::InvalidTag {
                    what: "entity area",
                    tag,
                });
            }
        };
        let device_class = r.opt_str("entity device class")?;

        let attribute_count = r.len("attribute count")?;
        let mut keys = Vec::with_capacity(attribute_count.min(256));
        let mut attributes = BTreeMap::new();
        for _ in 0..attribute_count {
            let key = r.str("attribute key")?;
            let value = match r.u8("attribute tag")? {
                0 => match r.u8("attribute value")? {
                    0 => AttributeValue::Bool(false),
                    1 => AttributeValue::Bool(true),
                    tag => {
                        return Err(CodecError::InvalidTag {
                            what: "bool attribute",
                            tag,
                        });
                    }
                },
                1 => AttributeValue::Int(r.i64("attribute value")?),
                2 => {
                    let value = f64::from_bits(r.u64("attribute value")?);
                    if !value.is_finite() {
                        return Err(CodecError::NonCanonical("non-finite attribute"));
                    }
                    AttributeValue::Float(value)
                }
                3 => AttributeValue::String(r.str("attribute value")?),
                tag => {
                    return Err(CodecError::InvalidTag {
                        what: "attribute",
                        tag,
                    });
                }
            };
            keys.push(key.clone());
            attributes.insert(key, value);
        }
        ensure_ascending(&keys, "attribute order")?;

        let descriptor_count = r.len("descriptor count")?;
        let mut names = Vec::with_capacity(descriptor_count.min(64));
        let mut descriptors = BTreeMap::new();
        for _ in 0..descriptor_count {
            let name = r.str("descriptor name")?;
            let descriptor = decode_descriptor(&mut r)?;
            names.push(name.clone());
            descriptors.insert(name, descriptor);
        }
        ensure_ascending(&names, "descriptor order")?;

        let capability_count = r.len("capability count")?;
        let mut capabilities = Vec::with_capacity(capability_count.min(256));
        for _ in 0..capability_count {
            capabilities.push(r.str("capability")?);
        }
        ensure_ascending(&capabilities, "capability order")?;

        let status = match r.u8("entity status")? {
            0 => ValidationStatus::Valid,
            1 => ValidationStatus::ValidWithWarnings,
            2 => ValidationStatus::Rejected,
            tag => {
                return Err(CodecError::InvalidTag {
                    what: "entity status",
                    tag,
                });
            }
        };

        entities.push(Entity {
            id,
            platform_id,
            domain,
            name,
            device_id,
            area,
            device_class,
            attributes,
            descriptors,
            capabilities: capabilities.into_iter().collect::<BTreeSet<_>>(),
            status,
        });
    }
    r.finish("entities")?;
    let ids: Vec<&EntityId> = entities.iter().map(|entity| &entity.id).collect();
    ensure_ascending(&ids, "entity order")?;
    Ok(entities)
}

fn decode_descriptor(r: &mut Reader<'_>) -> Result<AttributeDescriptor, CodecError> {
    let tag = r.u8("descriptor kind")?;
    let kind = FieldKind::from_code(tag).ok_or(CodecError::InvalidTag {
        what: "descriptor kind",
        tag,
    })?;
    let unit = r.opt_str("descriptor unit")?;
    let optional = r.flag("descriptor optional")?;
    let value_count = r.len("enum value count")?;
    let mut values = Vec::with_capacity(value_count.min(256));
    for _ in 0..value_count {
        let value = r.str("enum value")?;
        if values.contains(&value) {
            return Err(CodecError::NonCanonical("enum values"));
        }
        values.push(value);
    }
    let range = match r.u8("descriptor range")? {
        0 => None,
        1 => Some(CapabilityRange {
            min: r.opt_f64("range min")?,
            max: r.opt_f64("range max")?,
            step: r.opt_f64("range step")?,
        }),
        tag => {
            return Err(CodecError::InvalidTag {
                what: "descriptor range",
                tag,
            });
        }
    };
    Ok(AttributeDescriptor {
        kind,
        unit,
        optional,
        values,
        range,
    })
}

fn decode_services(mut r: Reader<'_>) -> Result<Vec<Service>, CodecError> {
    let count = r.len("service count")?;
    let mut services = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        let mut service = Service::new(r.str("service domain")?, r.str("service name")?);
        let field_count = r.len("service field count")?;
        let mut names = Vec::with_capacity(field_count.min(64));
        for _ in 0..field_count {
            let name = r.str("service field name")?;
            let field = ServiceField {
                kind: r.opt_str("service field type")?,
                unit: r.opt_str("service field unit")?,
                required: r.flag("service field required")?,
            };
            names.push(name.clone());
            service.fields.insert(name, field);
        }
        ensure_ascending(&names, "service field order")?;
        services.push(service);
    }
    r.finish("services")?;
    let keys: Vec<(&str, &str)> = services
        .iter()
        .map(|service| (service.domain.as_str(), service.name.as_str()))
        .collect();
    ensure_ascending(&keys, "service order")?;
    Ok(services)
}

fn decode_devices(mut r: Reader<'_>) -> Result<Vec<Device>, CodecError> {
    let count = r.len("device count")?;
    let mut devices = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        devices.push(Device {
            id: r.id("device id")?,
            platform_id: r.str("device platform id")?,
            name: r.str("device name")?,
            area_id: r.opt_id("device area")?,
            manufacturer: r.opt_str("device manufacturer")?,
            model: r.opt_str("device model")?,
        });
    }
    r.finish("devices")?;
    let ids: Vec<&DeviceId> = devices.iter().map(|device| &device.id).collect();
    ensure_ascending(&ids, "device order")?;
    Ok(devices)
}

fn decode_areas(mut r: Reader<'_>) -> Result<Vec<Area>, CodecError> {
    let count = r.len("area count")?;
    let mut areas = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        areas.push(Area {
            id: r.id("area id")?,
            platform_id: r.str("area platform id")?,
            name: r.str("area name")?,
            parent_id: r.opt_id("area parent")?,
        });
    }
    r.finish("areas")?;
    let ids: Vec<&AreaId> = areas.iter().map(|area| &area.id).collect();
    ensure_ascending(&ids, "area order")?;
    Ok(areas)
}

/// Content checksum over the canonical entity, device, area and service
/// sections.
///
/// # Errors
///
/// Returns [`CodecError::TooLong`] when an item cannot be encoded.
pub fn content_checksum(
    entities: &[Entity],
    devices: &[Device],
    areas: &[Area],
    services: &[Service],
) -> Result<Checksum, CodecError> {
    let sections: [(&[u8], Vec<u8>); 4] = [
        (b"entities", encode_entities(entities)?),
        (b"devices", encode_devices(devices)?),
        (b"areas", encode_areas(areas)?),
        (b"services", encode_services(services)?),
    ];
    let mut hasher = Sha256::new();
    hasher.update(CHECKSUM_DOMAIN);
    for (label, body) in &sections {
        hasher.update((label.len() as u64).to_be_bytes());
        hasher.update(label);
        hasher.update((body.len() as u64).to_be_bytes());
        hasher.update(body);
    }
    Ok(Checksum::from_hex(hex::encode(hasher.finalize())))
}

/// Encode a manifest to its canonical binary form.
///
/// # Errors
///
/// Returns [`CodecError::TooLong`] when a string or collection exceeds the
/// `u32` length prefix.
pub fn encode(manifest: &Manifest) -> Result<Vec<u8>, CodecError> {
    let mut header = Writer::default();
    header.str(&manifest.lineage, "lineage")?;
    header.u64(manifest.version.sequence);
    header.u64(manifest.version.major);
    header.u64(manifest.version.minor);
    header.u64(manifest.version.patch);
    header.u16(manifest.schema_version.major);
    header.u16(manifest.schema_version.minor);
    let (secs, nanos) = time::to_parts(manifest.generated_at);
    header.i64(secs);
    header.u32(nanos);

    let mut checksum = Writer::default();
    checksum.str(manifest.checksum.as_str(), "checksum")?;

    let mut out = Writer::default();
    out.buf.extend_from_slice(MAGIC);
    out.u16(FORMAT_VERSION);
    out.bytes(&header.into_bytes(), "header")?;
    out.bytes(&encode_entities(&manifest.entities)?, "entities")?;
    out.bytes(&encode_devices(&manifest.devices)?, "devices")?;
    out.bytes(&encode_areas(&manifest.areas)?, "areas")?;
    out.bytes(&encode_services(&manifest.services)?, "services")?;
    out.bytes(&checksum.into_bytes(), "checksum")?;
    Ok(out.into_bytes())
}

/// Decode a binary manifest.
///
/// The checksum is read as recorded, not verified; see
/// [`Manifest::verify_checksum`].
///
/// # Errors
///
/// Returns [`CodecError`] for any input [`encode`] could not have produced.
pub fn decode(bytes: &[u8]) -> Result<Manifest, CodecError> {
    let mut r = Reader::new(bytes);
    let magic: [u8; 4] = r.array("magic").map_err(|_| CodecError::BadMagic)?;
    if &magic != MAGIC {
        return Err(CodecError::BadMagic);
    }
    let format = r.u16("format version")?;
    if format != FORMAT_VERSION {
        return Err(CodecError::UnsupportedFormat(format));
    }

    let mut header = r.section("header")?;
    let lineage = header.str("lineage")?;
    let version = ManifestVersion {
        sequence: header.u64("version")?,
        major: header.u64("version")?,
        minor: header.u64("version")?,
        patch: header.u64("version")?,
    };
    let schema_version = SchemaVersion::new(header.u16("schema version")?, header.u16("schema version")?);
    let secs = header.i64("generated at")?;
    let nanos = header.u32("generated at")?;
    let generated_at = time::from_parts(secs, nanos).ok_or(CodecError::InvalidTimestamp)?;
    header.finish("header")?;

    let entities = decode_entities(r.section("entities")?)?;
    let devices = decode_devices(r.section("devices")?)?;
    let areas = decode_areas(r.section("areas")?)?;
    let services = decode_services(r.section("services")?)?;

    let mut checksum_section = r.section("checksum")?;
    let checksum = checksum_section.str("checksum")?;
    checksum_section.finish("checksum")?;
    if checksum.len() != 64 || !checksum.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(CodecError::NonCanonical("checksum"));
    }

    if !r.buf.is_empty() {
        return Err(CodecError::TrailingBytes(r.buf.len()));
    }

    Ok(Manifest {
        lineage,
        version,
        schema_version,
        generated_at,
        entities,
        devices,
        areas,
        services,
        checksum: Checksum::from_hex(checksum),
    })
}
