//! GeoTIFF georeferencing tags.

use crate::types::{Crs, GeoTransform};

// GeoTIFF tag IDs (not in the standard tiff crate)
pub const MODEL_PIXEL_SCALE: u16 = 33550;
pub const MODEL_TIEPOINT: u16 = 33922;
pub const MODEL_TRANSFORMATION: u16 = 34264;
pub const GEO_KEY_DIRECTORY: u16 = 34735;
pub const GEO_DOUBLE_PARAMS: u16 = 34736;
pub const GEO_ASCII_PARAMS: u16 = 34737;

// GeoKey IDs
const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GT_CITATION: u16 = 1026;
const GEOGRAPHIC_TYPE: u16 = 2048;
const GEOG_CITATION: u16 = 2049;
const GEOG_GEODETIC_DATUM: u16 = 2050;
const GEOG_ANGULAR_UNITS: u16 = 2054;
const GEOG_ELLIPSOID: u16 = 2056;
const GEOG_SEMI_MAJOR_AXIS: u16 = 2057;
const GEOG_SEMI_MINOR_AXIS: u16 = 2058;
const PROJECTED_CS_TYPE: u16 = 3072;
const PROJECTION: u16 = 3074;
const PROJ_COORD_TRANS: u16 = 3075;
const PROJ_LINEAR_UNITS: u16 = 3076;
const PROJ_FALSE_EASTING: u16 = 3082;
const PROJ_FALSE_NORTHING: u16 = 3083;
const PROJ_CENTER_LONG: u16 = 3088;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;
const USER_DEFINED: u16 = 32767;
const ANGULAR_DEGREE: u16 = 9102;
const LINEAR_METER: u16 = 9001;
const CT_SINUSOIDAL: u16 = 24;

enum KeyValue {
    Short(u16),
    Double(f64),
    Ascii(String),
}

/// GeoKey directory with its double and ASCII parameter blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoKeyDirectory {
    pub directory: Vec<u16>,
    pub doubles: Vec<f64>,
    pub ascii: String,
}

impl GeoKeyDirectory {
    /// Keys describing `crs`.
    pub fn for_crs(crs: &Crs) -> Self {
        let mut keys: Vec<(u16, KeyValue)> = vec![(GT_RASTER_TYPE, KeyValue::Short(RASTER_PIXEL_IS_AREA))];

        match crs {
            Crs::Geographic(code) => {
                keys.push((GT_MODEL_TYPE, KeyValue::Short(MODEL_TYPE_GEOGRAPHIC)));
                keys.push((GEOGRAPHIC_TYPE, KeyValue::Short(*code)));
            }
            Crs::Projected(code) => {
                keys.push((GT_MODEL_TYPE, KeyValue::Short(MODEL_TYPE_PROJECTED)));
                keys.push((PROJECTED_CS_TYPE, KeyValue::Short(*code)));
            }
            Crs::Sinusoidal {
                sphere_radius,
                central_meridian,
                false_easting,
                false_northing,
            } => {
                keys.extend([
                    (GT_MODEL_TYPE, KeyValue::Short(MODEL_TYPE_PROJECTED)),
                    (GT_CITATION, KeyValue::Ascii(crs.to_proj4())),
                    (GEOGRAPHIC_TYPE, KeyValue::Short(USER_DEFINED)),
                    (
                        GEOG_CITATION,
                        KeyValue::Ascii("Unknown datum based upon the custom spheroid".to_string()),
                    ),
                    (GEOG_GEODETIC_DATUM, KeyValue::Short(USER_DEFINED)),
                    (GEOG_ANGULAR_UNITS, KeyValue::Short(ANGULAR_DEGREE)),
                    (GEOG_ELLIPSOID, KeyValue::Short(USER_DEFINED)),
                    (GEOG_SEMI_MAJOR_AXIS, KeyValue::Double(*sphere_radius)),
                    (GEOG_SEMI_MINOR_AXIS, KeyValue::Double(*sphere_radius)),
                    (PROJECTED_CS_TYPE, KeyValue::Short(USER_DEFINED)),
                    (PROJECTION, KeyValue::Short(USER_DEFINED)),
                    (PROJ_COORD_TRANS, KeyValue::Short(CT_SINUSOIDAL)),
                    (PROJ_LINEAR_UNITS, KeyValue::Short(LINEAR_METER)),
                    (PROJ_FALSE_EASTING, KeyValue::Double(*false_easting)),
                    (PROJ_FALSE_NORTHING, KeyValue::Double(*false_northing)),
                    (PROJ_CENTER_LONG, KeyValue::Double(*central_meridian)),
                ]);
            }
        }

        // Keys must be written in ascending ID order
        keys.sort_by_key(|(id, _)| *id);

        // [KeyDirectoryVersion, KeyRevision, MinorRevision, NumberOfKeys]
        let mut directory = vec![1, 1, 0, keys.len() as u16];
        let mut doubles = Vec::new();
        let mut ascii = String::new();

        for (id, value) in keys {
            match value {
                KeyValue::Short(v) => directory.extend_from_slice(&[id, 0, 1, v]),
                KeyValue::Double(v) => {
                    directory.extend_from_slice(&[id, GEO_DOUBLE_PARAMS, 1, doubles.len() as u16]);
                    doubles.push(v);
                }
                KeyValue::Ascii(text) => {
                    // Each entry is terminated by '|', which counts toward its length
                    let offset = ascii.len() as u16;
                    ascii.push_str(&text);
                    ascii.push('|');
                    directory.extend_from_slice(&[
                        id,
                        GEO_ASCII_PARAMS,
                        (text.len() + 1) as u16,
                        offset,
                    ]);
                }
            }
        }

        Self {
            directory,
            doubles,
            ascii,
        }
    }

    /// Number of keys in the directory.
    pub fn key_count(&self) -> usize {
        self.directory.get(3).copied().unwrap_or(0) as usize
    }

    /// Value entry of `key`: `(location, count, value_or_offset)`.
    pub fn entry(&self, key: u16) -> Option<(u16, u16, u16)> {
        self.directory[4..]
            .chunks_exact(4)
            .find(|entry| entry[0] == key)
            .map(|entry| (entry[1], entry[2], entry[3]))
    }
}

/// Placement tags for a transform: pixel scale and tiepoint for north-up
/// grids, a full model transformation otherwise.
pub enum ModelPlacement {
    ScaleTiepoint { scale: [f64; 3], tiepoint: [f64; 6] },
    Transformation([f64; 16]),
}

impl ModelPlacement {
    pub fn for_transform(transform: &GeoTransform) -> Self {
        let t = transform.0;
        if transform.is_rotated() {
            Self::Transformation([
                t[1], t[2], 0.0, t[0], //
                t[4], t[5], 0.0, t[3], //
                0.0, 0.0, 0.0, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ])
        } else {
            Self::ScaleTiepoint {
                scale: [t[1], -t[5], 0.0],
                tiepoint: [0.0, 0.0, 0.0, t[0], t[3], 0.0],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geographic_keys() {
        let keys = GeoKeyDirectory::for_crs(&Crs::Geographic(4326));
        assert_eq!(keys.key_count(), 3);
        assert_eq!(keys.entry(GT_MODEL_TYPE), Some((0, 1, MODEL_TYPE_GEOGRAPHIC)));
        assert_eq!(keys.entry(GEOGRAPHIC_TYPE), Some((0, 1, 4326)));
        assert!(keys.doubles.is_empty());
        assert!(keys.ascii.is_empty());
    }

    #[test]
    fn test_sinusoidal_keys() {
        let keys = GeoKeyDirectory::for_crs(&Crs::modis_sinusoidal());

        assert_eq!(keys.entry(PROJECTED_CS_TYPE), Some((0, 1, USER_DEFINED)));
        assert_eq!(keys.entry(PROJ_COORD_TRANS), Some((0, 1, CT_SINUSOIDAL)));

        let (location, count, index) = keys.entry(GEOG_SEMI_MAJOR_AXIS).unwrap();
        assert_eq!(location, GEO_DOUBLE_PARAMS);
        assert_eq!(count, 1);
        assert_eq!(keys.doubles[index as usize], Crs::MODIS_SPHERE_RADIUS);

        let (location, count, offset) = keys.entry(GT_CITATION).unwrap();
        assert_eq!(location, GEO_ASCII_PARAMS);
        let citation = &keys.ascii[offset as usize..(offset + count) as usize];
        assert!(citation.starts_with("+proj=sinu"));
        assert!(citation.ends_with('|'));
    }

    #[test]
    fn test_keys_sorted() {
        let keys = GeoKeyDirectory::for_crs(&Crs::modis_sinusoidal());
        let ids: Vec<u16> = keys.directory[4..].chunks_exact(4).map(|e| e[0]).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), keys.key_count());
    }

    #[test]
    fn test_placement() {
        let north_up = GeoTransform::north_up(-100.0, 50.0, 2.0, 3.0);
        match ModelPlacement::for_transform(&north_up) {
            ModelPlacement::ScaleTiepoint { scale, tiepoint } => {
                assert_eq!(scale, [2.0, 3.0, 0.0]);
                assert_eq!(tiepoint, [0.0, 0.0, 0.0, -100.0, 50.0, 0.0]);
            }
            ModelPlacement::Transformation(_) => panic!("expected scale/tiepoint"),
        }

        let rotated = GeoTransform([0.0, 1.0, 0.5, 0.0, 0.5, -1.0]);
        assert!(matches!(
            ModelPlacement::for_transform(&rotated),
            ModelPlacement::Transformation(_)
        ));
    }
}
