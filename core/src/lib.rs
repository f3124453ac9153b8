//! Cross-mode digital voice gateway between DMR and YSF networks
//!
//! Voice arrives as Homebrew `DMRD` frames from an MMDVMHost or as `YSFD`
//! frames from a YSF reflector. The AMBE+2 vocoder parameters are pulled out
//! into [`VoiceFrame`] units, regrouped by the [`ModeConverter`] and rebuilt
//! into the other protocol's frames with fresh sync, FEC and signalling.

pub mod error;
pub mod bits;
pub mod crc;
pub mod golay;
pub mod hamming;
pub mod qr1676;
pub mod bptc;
pub mod rs129;
pub mod convolution;
pub mod sync;
pub mod ambe;
pub mod dmr_lc;
pub mod dmr_embedded;
pub mod dmr;
pub mod ysf_fich;
pub mod ysf_payload;
pub mod ysf;
pub mod queue;
pub mod convert;
pub mod wiresx;
pub mod routing;
pub mod lookup;
pub mod timer;
pub mod transport;
pub mod network;
pub mod config;
pub mod gateway;

pub use ambe::VoiceFrame;
pub use config::GatewayConfig;
pub use convert::ModeConverter;
pub use error::{GatewayError, Result};
pub use gateway::{Gateway, StreamSession};
pub use lookup::{DmrIdTable, IdLookup};
pub use network::{DmrNetwork, YsfNetwork};
pub use queue::{FrameTag, StreamQueue};
pub use routing::{RouteAction, RouteTable};
pub use sync::FrameMarker;
pub use transport::{Transport, UdpTransport};
