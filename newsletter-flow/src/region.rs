use market_client::domain::Region;

/// (EIC code, short name, display name) of the bidding zones and control
/// areas the newsletter knows how to label.
const AREAS: &[(&str, &str, &str)] = &[
    ("10Y1001A1001A83F", "DE", "Germany"),
    ("10Y1001A1001A82H", "DE_LU", "DE-LU BZ / MBA"),
    ("10Y1001A1001A63L", "DE_AT_LU", "DE-AT-LU BZ"),
    ("10YDE-VE-------2", "DE_50HZ", "50Hertz CA, DE(50HzT) BZA"),
    ("10YDE-RWENET---I", "DE_AMPRION", "Amprion CA"),
    ("10YDE-EON------1", "DE_TENNET", "TenneT GER CA"),
    ("10YDE-ENBW-----N", "DE_TRANSNET", "TransnetBW CA"),
    ("10YAT-APG------L", "AT", "Austria, APG BZ / CA / MBA"),
    ("10YBE----------2", "BE", "Belgium, Elia BZ / CA / MBA"),
    ("10YNL----------L", "NL", "Netherlands, TenneT NL BZ / CA / MBA"),
    ("10YFR-RTE------C", "FR", "France, RTE BZ / CA / MBA"),
    ("10YCH-SWISSGRIDZ", "CH", "Switzerland, Swissgrid BZ / CA / MBA"),
    ("10YCZ-CEPS-----N", "CZ", "Czech Republic, CEPS BZ / CA / MBA"),
    ("10YPL-AREA-----S", "PL", "Poland, PSE SA BZ / BZA / CA / MBA"),
    ("10YDK-1--------W", "DK_1", "DK1 BZ / MBA"),
    ("10YDK-2--------M", "DK_2", "DK2 BZ / MBA"),
    ("10YNO-2--------T", "NO_2", "NO2 BZ / MBA"),
    ("10Y1001A1001A46L", "SE_3", "SE3 BZ / MBA"),
    ("10Y1001A1001A47J", "SE_4", "SE4 BZ / MBA"),
    ("10YES-REE------0", "ES", "Spain, REE BZ / CA / MBA"),
    ("10YIT-GRTN-----B", "IT", "Italy, IT CA / MBA"),
    ("10YGB----------A", "GB", "National Grid BZ / CA / MBA"),
];

/// Looks up the display names for a bidding zone EIC code.
pub fn lookup(code: &str) -> Option<Region> {
    AREAS
        .iter()
        .find(|(eic, _, _)| *eic == code)
        .map(|(eic, short, display)| Region {
            code: eic.to_string(),
            short_name: short.to_string(),
            display_name: display.to_string(),
        })
}

/// Resolves a code to a [`Region`]. Unknown codes keep the raw code as
/// their name so the run can still query the data provider with it.
pub fn resolve_region(code: &str) -> Region {
    match lookup(code) {
        Some(region) => region,
        None => {
            tracing::warn!(code, "unknown bidding zone code, using raw code as region name");
            metrics::counter!("region_unknown_total").increment(1);
            Region::unmapped(code)
        }
    }
}
