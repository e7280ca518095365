use crossbeam_channel::{unbounded, Receiver, Sender};

/// Latest-value broadcast cell.
///
/// Every subscriber first receives the current value, then each published
/// value in order. Subscribers whose receiver was dropped are pruned on the
/// next publish.
pub struct Watch<T: Clone> {
    latest: T,
    subscribers: Vec<Sender<T>>,
}

impl<T: Clone> Watch<T> {
    pub fn new(initial: T) -> Self {
        Self {
            latest: initial,
            subscribers: Vec::new(),
        }
    }

    pub fn get(&self) -> &T {
        &self.latest
    }

    pub fn subscribe(&mut self) -> Receiver<T> {
        let (tx, rx) = unbounded();
        // Cannot fail: the receiver is still alive.
        let _ = tx.send(self.latest.clone());
        self.subscribers.push(tx);
        rx
    }

    pub fn publish(&mut self, value: T) {
        self.latest = value;
        let latest = &self.latest;
        self.subscribers.retain(|tx| tx.send(latest.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T: Clone + Default> Default for Watch<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_subscriber_sees_latest_value() {
        let mut watch = Watch::new(1);
        watch.publish(2);
        let rx = watch.subscribe();
        assert_eq!(rx.try_recv(), Ok(2));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn published_values_arrive_in_order() {
        let mut watch = Watch::new("idle");
        let rx = watch.subscribe();
        watch.publish("training");
        watch.publish("idle");
        let seen: Vec<_> = rx.try_iter().collect();
        assert_eq!(seen, vec!["idle", "training", "idle"]);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut watch = Watch::new(0u8);
        let keep = watch.subscribe();
        drop(watch.subscribe());
        assert_eq!(watch.subscriber_count(), 2);
        watch.publish(1);
        assert_eq!(watch.subscriber_count(), 1);
        assert_eq!(keep.try_iter().last(), Some(1));
    }
}
