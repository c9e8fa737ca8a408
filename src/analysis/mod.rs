/// Record transformation for the NWM velocity snapshot.
///
/// Submodules:
/// - `categories`: velocity and streamflow severity bands.
/// - `groupings`: inner join of the velocity and streamflow sets by reach.
/// - `transform`: validation, unit conversion, and per-reach classification.

pub mod categories;
pub mod groupings;
pub mod transform;
