// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use crate::ids::Tag;
use std::collections::HashMap;

/// Mapping from input-tag to output-tag. Input tags absent from the map
/// are silently skipped when the Processing API enumerates jobs.
pub type TagMap = HashMap<Tag, Tag>;
