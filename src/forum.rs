use crate::errors::{Result, StoreError};
use crate::kv::{K_FORUM_CATEGORIES, K_FORUM_POSTS, K_FORUM_THREADS, KvStore};
use crate::models::{ForumCategory, ForumPost, ForumThread, User, new_id, now};
use crate::seed;

/// Community forum: categories own threads, threads own posts. Threads
/// carry denormalized `postCount`/`lastReplyAt` that post create/delete
/// keep in sync.
pub struct ForumStore<'a> {
    kv: &'a KvStore,
}

impl<'a> ForumStore<'a> {
    pub fn new(kv: &'a KvStore) -> Self {
        Self { kv }
    }

    pub fn categories(&self) -> Vec<ForumCategory> {
        match self.kv.get_as(K_FORUM_CATEGORIES) {
            Some(categories) => categories,
            None => {
                let categories = seed::forum_categories();
                let _ = self.kv.set_as(K_FORUM_CATEGORIES, &categories);
                categories
            }
        }
    }

    pub fn threads(&self) -> Vec<ForumThread> {
        match self.kv.get_as(K_FORUM_THREADS) {
            Some(threads) => threads,
            None => {
                let threads = seed::forum_threads();
                let _ = self.kv.set_as(K_FORUM_THREADS, &threads);
                threads
            }
        }
    }

    pub fn posts(&self) -> Vec<ForumPost> {
        match self.kv.get_as(K_FORUM_POSTS) {
            Some(posts) => posts,
            None => {
                let posts = seed::forum_posts();
                let _ = self.kv.set_as(K_FORUM_POSTS, &posts);
                posts
            }
        }
    }

    fn save_threads(&self, threads: &[ForumThread]) -> Result<()> {
        self.kv.set_as(K_FORUM_THREADS, &threads)
    }

    fn save_posts(&self, posts: &[ForumPost]) -> Result<()> {
        self.kv.set_as(K_FORUM_POSTS, &posts)
    }

    /// Most recent reply first.
    pub fn threads_in(&self, category_id: &str) -> Vec<ForumThread> {
        let mut threads: Vec<ForumThread> = self
            .threads()
            .into_iter()
            .filter(|t| t.category_id == category_id)
            .collect();
        threads.sort_by(|a, b| b.last_reply_at.cmp(&a.last_reply_at));
        threads
    }

    pub fn thread(&self, id: &str) -> Option<ForumThread> {
        self.threads().into_iter().find(|t| t.id == id)
    }

    /// Oldest first, forum reading order.
    pub fn posts_in(&self, thread_id: &str) -> Vec<ForumPost> {
        let mut posts: Vec<ForumPost> = self
            .posts()
            .into_iter()
            .filter(|p| p.thread_id == thread_id)
            .collect();
        posts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        posts
    }

    /// A thread is born with its opening post; count starts at 1.
    pub fn create_thread(
        &self,
        author: &User,
        category_id: &str,
        title: &str,
        body: &str,
    ) -> Result<ForumThread> {
        if !self.categories().iter().any(|c| c.id == category_id) {
            return Err(StoreError::not_found("category", category_id));
        }

        let stamp = now();
        let thread = ForumThread {
            id: new_id(),
            category_id: category_id.to_string(),
            title: title.to_string(),
            author_id: author.id.clone(),
            author_name: author.name.clone(),
            created_at: stamp.clone(),
            post_count: 1,
            last_reply_at: stamp.clone(),
        };
        let post = ForumPost {
            id: new_id(),
            thread_id: thread.id.clone(),
            author_id: author.id.clone(),
            author_name: author.name.clone(),
            body: body.to_string(),
            created_at: stamp,
        };

        let mut threads = self.threads();
        threads.push(thread.clone());
        self.save_threads(&threads)?;

        let mut posts = self.posts();
        posts.push(post);
        self.save_posts(&posts)?;

        Ok(thread)
    }

    pub fn add_post(&self, author: &User, thread_id: &str, body: &str) -> Result<ForumPost> {
        let mut threads = self.threads();
        let thread = threads
            .iter_mut()
            .find(|t| t.id == thread_id)
            .ok_or_else(|| StoreError::not_found("thread", thread_id))?;

        let post = ForumPost {
            id: new_id(),
            thread_id: thread_id.to_string(),
            author_id: author.id.clone(),
            author_name: author.name.clone(),
            body: body.to_string(),
            created_at: now(),
        };
        thread.post_count += 1;
        thread.last_reply_at = post.created_at.clone();

        let mut posts = self.posts();
        posts.push(post.clone());
        self.save_posts(&posts)?;
        self.save_threads(&threads)?;

        Ok(post)
    }

    /// Cascade rule: removing a thread's last remaining post removes the
    /// thread itself; otherwise the denormalized count is decremented.
    pub fn delete_post(&self, post_id: &str) -> Result<()> {
        let mut posts = self.posts();
        let position = posts
            .iter()
            .position(|p| p.id == post_id)
            .ok_or_else(|| StoreError::not_found("post", post_id))?;
        let removed = posts.remove(position);
        self.save_posts(&posts)?;

        let remaining = posts.iter().any(|p| p.thread_id == removed.thread_id);
        let mut threads = self.threads();
        if remaining {
            if let Some(thread) = threads.iter_mut().find(|t| t.id == removed.thread_id) {
                thread.post_count = thread.post_count.saturating_sub(1);
            }
        } else {
            threads.retain(|t| t.id != removed.thread_id);
        }
        self.save_threads(&threads)
    }

    /// Deleting a thread takes its posts with it.
    pub fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let mut threads = self.threads();
        let before = threads.len();
        threads.retain(|t| t.id != thread_id);
        if threads.len() == before {
            return Err(StoreError::not_found("thread", thread_id));
        }
        self.save_threads(&threads)?;

        let posts: Vec<ForumPost> = self
            .posts()
            .into_iter()
            .filter(|p| p.thread_id != thread_id)
            .collect();
        self.save_posts(&posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::testutil::temp_store;
    use crate::models::{TechStats, UserType};

    fn author(id: &str) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@x.com"),
            username: id.to_string(),
            password: "pw".to_string(),
            user_type: UserType::Technician,
            name: id.to_string(),
            phone: None,
            address: None,
            bio: None,
            avatar: None,
            skills: Default::default(),
            overall_rating: 0.0,
            total_reviews: 0,
            stats: TechStats::default(),
            created_at: now(),
        }
    }

    #[test]
    fn fresh_store_is_seeded() {
        let (_dir, kv) = temp_store();
        let forum = ForumStore::new(&kv);
        assert_eq!(forum.categories().len(), 3);
        assert_eq!(forum.threads().len(), 1);
        assert_eq!(forum.posts().len(), 1);
    }

    #[test]
    fn new_thread_starts_with_one_post() {
        let (_dir, kv) = temp_store();
        let forum = ForumStore::new(&kv);
        let thread = forum
            .create_thread(&author("sam"), "cat-general", "Intro", "hello all")
            .unwrap();
        assert_eq!(thread.post_count, 1);
        assert_eq!(forum.posts_in(&thread.id).len(), 1);
    }

    #[test]
    fn replies_bump_count_and_last_reply() {
        let (_dir, kv) = temp_store();
        let forum = ForumStore::new(&kv);
        let thread = forum
            .create_thread(&author("sam"), "cat-general", "Intro", "hello")
            .unwrap();
        let reply = forum.add_post(&author("kim"), &thread.id, "welcome").unwrap();

        let updated = forum.thread(&thread.id).unwrap();
        assert_eq!(updated.post_count, 2);
        assert_eq!(updated.last_reply_at, reply.created_at);
    }

    #[test]
    fn deleting_one_of_several_posts_decrements_count() {
        let (_dir, kv) = temp_store();
        let forum = ForumStore::new(&kv);
        let thread = forum
            .create_thread(&author("sam"), "cat-general", "Intro", "hello")
            .unwrap();
        let reply = forum.add_post(&author("kim"), &thread.id, "welcome").unwrap();

        forum.delete_post(&reply.id).unwrap();
        let updated = forum.thread(&thread.id).unwrap();
        assert_eq!(updated.post_count, 1);
        assert_eq!(forum.posts_in(&thread.id).len(), 1);
    }

    #[test]
    fn deleting_the_last_post_removes_the_thread() {
        let (_dir, kv) = temp_store();
        let forum = ForumStore::new(&kv);
        let thread = forum
            .create_thread(&author("sam"), "cat-general", "Intro", "hello")
            .unwrap();
        let opening = forum.posts_in(&thread.id)[0].clone();

        forum.delete_post(&opening.id).unwrap();
        assert!(forum.thread(&thread.id).is_none());
    }

    #[test]
    fn deleting_a_thread_removes_its_posts() {
        let (_dir, kv) = temp_store();
        let forum = ForumStore::new(&kv);
        let thread = forum
            .create_thread(&author("sam"), "cat-leads", "Pricing", "thoughts?")
            .unwrap();
        forum.add_post(&author("kim"), &thread.id, "depends").unwrap();

        forum.delete_thread(&thread.id).unwrap();
        assert!(forum.posts_in(&thread.id).is_empty());
        // The seeded thread is untouched.
        assert_eq!(forum.threads().len(), 1);
    }
}
