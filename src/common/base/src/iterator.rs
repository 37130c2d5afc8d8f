#[async_trait]
pub trait AsyncIterator {
    type Item;
    async fn try_next(&mut self) -> anyhow::Result<Option<Self::Item>>;
}

/// AsyncIterators chains several iterators, draining each one in order.
pub struct AsyncIterators<ITR>
where
    ITR: AsyncIterator + Send,
{
    itrs: Vec<ITR>,
    i: usize,
}

impl<ITR> AsyncIterators<ITR>
where
    ITR: AsyncIterator + Send,
{
    pub fn new(itrs: Vec<ITR>) -> Self {
        Self { itrs, i: 0 }
    }
}

#[async_trait]
impl<ITR> AsyncIterator for AsyncIterators<ITR>
where
    ITR: AsyncIterator + Send,
    ITR::Item: Send,
{
    type Item = ITR::Item;

    async fn try_next(&mut self) -> anyhow::Result<Option<Self::Item>> {
        while self.i < self.itrs.len() {
            let itr = &mut self.itrs[self.i];
            if let Some(v) = itr.try_next().await? {
                return Ok(Some(v));
            }

            self.i += 1;
        }

        Ok(None)
    }
}

/// collect drains an iterator into a vector.
pub async fn collect<I>(mut itr: I) -> anyhow::Result<Vec<I::Item>>
where
    I: AsyncIterator + Send,
    I::Item: Send,
{
    let mut items = Vec::new();
    while let Some(item) = itr.try_next().await? {
        items.push(item);
    }
    Ok(items)
}
