//! Queue head arena
use ::kernel::prelude::*;
use crate::queue::Qh;

/// Index of a queue head in the arena
#[derive(Copy,Clone,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct QhId(usize);
impl_fmt! {
	Debug(self, f) for QhId { write!(f, "QH#{}", self.0) }
}

pub struct QhPool
{
	slots: Vec<Option<Qh>>,
	free_slots: Vec<usize>,
}
impl QhPool
{
	pub fn new() -> QhPool {
		QhPool {
			slots: Vec::new(),
			free_slots: Vec::new(),
		}
	}

	#[cfg(test)]
	pub fn test_id(n: usize) -> QhId {
		QhId(n)
	}

	pub fn alloc(&mut self, qh: Qh) -> QhId
	{
		match self.free_slots.pop()
		{
		Some(i) => {
			assert!(self.slots[i].is_none());
			self.slots[i] = Some(qh);
			QhId(i)
			},
		None => {
			self.slots.push(Some(qh));
			QhId(self.slots.len() - 1)
			},
		}
	}

	pub fn release(&mut self, id: QhId) -> Qh
	{
		match self.slots.get_mut(id.0).and_then(|s| s.take())
		{
		Some(v) => {
			self.free_slots.push(id.0);
			v
			},
		None => panic!("Releasing an unused {:?}", id),
		}
	}

	pub fn try_get(&self, id: QhId) -> Option<&Qh> {
		self.slots.get(id.0).and_then(|s| s.as_ref())
	}
	pub fn get(&self, id: QhId) -> &Qh {
		match self.try_get(id)
		{
		Some(v) => v,
		None => panic!("Stale {:?}", id),
		}
	}
	pub fn get_mut(&mut self, id: QhId) -> &mut Qh {
		match self.slots.get_mut(id.0).and_then(|s| s.as_mut())
		{
		Some(v) => v,
		None => panic!("Stale {:?}", id),
		}
	}

	/// Number of live queue heads
	pub fn len(&self) -> usize {
		self.slots.len() - self.free_slots.len()
	}
	pub fn iter(&self) -> impl Iterator<Item=(QhId, &Qh)> {
		self.slots.iter().enumerate().filter_map(|(i,s)| s.as_ref().map(|v| (QhId(i), v)))
	}
}
