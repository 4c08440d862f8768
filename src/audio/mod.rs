pub mod analysis;
pub mod chroma;
pub mod decode;
pub mod features;
pub mod hpss;
pub mod mel;
pub mod mfcc;
pub mod spectral;
pub mod spectrum;
pub mod tempo;
pub mod temporal;
