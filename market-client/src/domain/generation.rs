use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationPoint {
    pub ts: OffsetDateTime,
    pub mw: f64,
}

/// One generation (or forecast) series for a single production type.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSeries {
    /// ENTSO-E production type code, e.g. `B18`. Empty when the document omits it.
    pub psr_type: String,
    pub points: Vec<GenerationPoint>,
}

impl GenerationSeries {
    /// Display name of the production type, e.g. `Wind Offshore`.
    pub fn name(&self) -> &str {
        psr_type_name(&self.psr_type).unwrap_or(&self.psr_type)
    }
}

/// Maps an ENTSO-E production type (`psrType`) code to its display name.
pub fn psr_type_name(code: &str) -> Option<&'static str> {
    let name = match code {
        "A03" => "Mixed",
        "A04" => "Generation",
        "A05" => "Load",
        "B01" => "Biomass",
        "B02" => "Fossil Brown coal/Lignite",
        "B03" => "Fossil Coal-derived gas",
        "B04" => "Fossil Gas",
        "B05" => "Fossil Hard coal",
        "B06" => "Fossil Oil",
        "B07" => "Fossil Oil shale",
        "B08" => "Fossil Peat",
        "B09" => "Geothermal",
        "B10" => "Hydro Pumped Storage",
        "B11" => "Hydro Run-of-river and poundage",
        "B12" => "Hydro Water Reservoir",
        "B13" => "Marine",
        "B14" => "Nuclear",
        "B15" => "Other renewable",
        "B16" => "Solar",
        "B17" => "Waste",
        "B18" => "Wind Offshore",
        "B19" => "Wind Onshore",
        "B20" => "Other",
        "B25" => "Energy storage",
        _ => return None,
    };
    Some(name)
}
