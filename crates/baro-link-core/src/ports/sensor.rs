use crate::error::SensorError;

/// Port for a barometric pressure sensor (BMP085/180/388 family)
pub trait Barometer {
    fn begin(&mut self) -> impl Future<Output = Result<(), SensorError>>;

    /// Pressure in pascals
    fn read_pressure(&mut self) -> impl Future<Output = Result<f32, SensorError>>;

    /// Temperature in degrees Celsius
    fn read_temperature(&mut self) -> impl Future<Output = Result<f32, SensorError>>;
}
