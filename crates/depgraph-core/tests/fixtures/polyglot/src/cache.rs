use crate::store::save;

pub struct Cache {
    size: usize,
}

impl Cache {
    pub fn new() -> Self {
        Self::empty()
    }

    fn empty() -> Self {
        save();
        Cache { size: 0 }
    }
}
