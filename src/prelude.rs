pub use super::{ParallelProcessor, ParallelReader};

pub use crate::frag::{
    ClearRange, ClearStage, FetchFlags, FragRecord, FragStream, FragmentStore, ReadType,
};
pub use crate::store::{Location, OpenMode, StoreConfig};
