//! Common fixtures modelled on MODIS vegetation-index granules.

/// MODIS sinusoidal grid constants.
pub mod modis {
    /// Sphere radius used by the MODIS sinusoidal projection (metres).
    pub const SPHERE_RADIUS: f64 = 6_371_007.181;

    /// Width of one MODIS tile in metres.
    pub const TILE_SIZE_M: f64 = 1_111_950.519_667;

    /// Pixel count along one side of a 250 m tile.
    pub const PIXELS_250M: usize = 4800;

    /// Upper-left corner of tile h12v04 in sinusoidal metres.
    pub const H12V04_UPPER_LEFT: (f64, f64) = (-6_671_703.118, 5_559_752.598);

    /// Lower-right corner of tile h12v04 in sinusoidal metres.
    pub const H12V04_LOWER_RIGHT: (f64, f64) = (-5_559_752.598, 4_447_802.079);

    /// NDVI/EVI fill value.
    pub const VI_FILL: i16 = -3000;

    /// NDVI/EVI scale factor (stored value / 10000 = index).
    pub const VI_SCALE: f64 = 10_000.0;

    /// A MOD13Q1 granule file name as staged by the workflow.
    pub const MOD13Q1_NAME: &str = "MOD13Q1.A2021001.h12v04.061.2021018041334.hdf";

    /// Group holding the 250 m VI grids.
    pub const GRID_250M: &str = "MODIS_Grid_16DAY_250m_500m_VI";
}

/// Builds an abbreviated HDF-EOS `StructMetadata.0` text for a single grid.
pub fn struct_metadata(
    grid_name: &str,
    xdim: usize,
    ydim: usize,
    upper_left: (f64, f64),
    lower_right: (f64, f64),
) -> String {
    format!(
        "GROUP=SwathStructure\nEND_GROUP=SwathStructure\n\
         GROUP=GridStructure\n\
         \tGROUP=GRID_1\n\
         \t\tGridName=\"{grid_name}\"\n\
         \t\tXDim={xdim}\n\
         \t\tYDim={ydim}\n\
         \t\tUpperLeftPointMtrs=({:.6},{:.6})\n\
         \t\tLowerRightMtrs=({:.6},{:.6})\n\
         \t\tProjection=GCTP_SNSOID\n\
         \t\tProjParams=(6371007.181000,0,0,0,0,0,0,0,0,0,0,0,0)\n\
         \t\tSphereCode=-1\n\
         \t\tGridOrigin=HDFE_GD_UL\n\
         \tEND_GROUP=GRID_1\n\
         END_GROUP=GridStructure\n\
         END\n",
        upper_left.0, upper_left.1, lower_right.0, lower_right.1
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_h12v04_spans_one_tile() {
        let width = modis::H12V04_LOWER_RIGHT.0 - modis::H12V04_UPPER_LEFT.0;
        assert!((width - modis::TILE_SIZE_M).abs() < 1.0);
    }

    #[test]
    fn test_struct_metadata_contains_grid() {
        let text = struct_metadata("G", 10, 20, (0.0, 1.0), (2.0, 3.0));
        assert!(text.contains("GridName=\"G\""));
        assert!(text.contains("XDim=10"));
        assert!(text.contains("YDim=20"));
    }
}
