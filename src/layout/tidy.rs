//! Linear-time tidy tree placement (Buchheim, Jünger and Leipert's take on
//! Walker's algorithm). Works on an index arena; the caller supplies the
//! separation between neighbouring nodes.

/// Returns the horizontal offset of every node, with the root at 0.
/// `children[v]` lists the children of `v` left to right.
pub(super) fn tidy_offsets(
    children: &[Vec<usize>],
    root: usize,
    separation: impl Fn(usize, usize) -> f32,
) -> Vec<f32> {
    let mut tidy = Tidy::new(children, root, separation);
    tidy.first_walk_all(root);
    let virtual_root = tidy.virtual_root;
    tidy.m[virtual_root] = -tidy.z[root];
    let mut x = vec![0.0; children.len()];
    tidy.second_walk_all(root, &mut x);
    x
}

struct Tidy<F> {
    children: Vec<Vec<usize>>,
    parent: Vec<usize>,
    number: Vec<usize>,
    z: Vec<f32>,
    m: Vec<f32>,
    c: Vec<f32>,
    s: Vec<f32>,
    thread: Vec<Option<usize>>,
    ancestor: Vec<usize>,
    default_ancestor: Vec<Option<usize>>,
    virtual_root: usize,
    separation: F,
}

impl<F: Fn(usize, usize) -> f32> Tidy<F> {
    fn new(children: &[Vec<usize>], root: usize, separation: F) -> Self {
        let size = children.len() + 1;
        let virtual_root = children.len();
        let mut all_children: Vec<Vec<usize>> = children.to_vec();
        all_children.push(vec![root]);
        let mut parent = vec![virtual_root; size];
        let mut number = vec![0; size];
        for (v, kids) in all_children.iter().enumerate() {
            for (index, &child) in kids.iter().enumerate() {
                parent[child] = v;
                number[child] = index;
            }
        }
        Self {
            children: all_children,
            parent,
            number,
            z: vec![0.0; size],
            m: vec![0.0; size],
            c: vec![0.0; size],
            s: vec![0.0; size],
            thread: vec![None; size],
            ancestor: (0..size).collect(),
            default_ancestor: vec![None; size],
            virtual_root,
            separation,
        }
    }

    fn first_walk_all(&mut self, v: usize) {
        for index in 0..self.children[v].len() {
            let child = self.children[v][index];
            self.first_walk_all(child);
        }
        self.first_walk(v);
    }

    fn first_walk(&mut self, v: usize) {
        let parent = self.parent[v];
        let left = (self.number[v] > 0).then(|| self.children[parent][self.number[v] - 1]);
        if let (Some(&first), Some(&last)) = (self.children[v].first(), self.children[v].last()) {
            self.execute_shifts(v);
            let midpoint = (self.z[first] + self.z[last]) / 2.0;
            if let Some(w) = left {
                self.z[v] = self.z[w] + (self.separation)(v, w);
                self.m[v] = self.z[v] - midpoint;
            } else {
                self.z[v] = midpoint;
            }
        } else if let Some(w) = left {
            self.z[v] = self.z[w] + (self.separation)(v, w);
        }
        let fallback = self.default_ancestor[parent].unwrap_or(self.children[parent][0]);
        self.default_ancestor[parent] = Some(self.apportion(v, left, fallback));
    }

    fn second_walk_all(&mut self, v: usize, x: &mut [f32]) {
        let parent = self.parent[v];
        x[v] = self.z[v] + self.m[parent];
        self.m[v] += self.m[parent];
        for index in 0..self.children[v].len() {
            let child = self.children[v][index];
            self.second_walk_all(child, x);
        }
    }

    fn next_left(&self, v: usize) -> Option<usize> {
        self.children[v].first().copied().or(self.thread[v])
    }

    fn next_right(&self, v: usize) -> Option<usize> {
        self.children[v].last().copied().or(self.thread[v])
    }

    fn next_ancestor(&self, vim: usize, v: usize, fallback: usize) -> usize {
        let candidate = self.ancestor[vim];
        if self.parent[candidate] == self.parent[v] {
            candidate
        } else {
            fallback
        }
    }

    fn move_subtree(&mut self, wm: usize, wp: usize, shift: f32) {
        let change = shift / (self.number[wp] as f32 - self.number[wm] as f32);
        self.c[wp] -= change;
        self.s[wp] += shift;
        self.c[wm] += change;
        self.z[wp] += shift;
        self.m[wp] += shift;
    }

    fn execute_shifts(&mut self, v: usize) {
        let mut shift = 0.0;
        let mut change = 0.0;
        for index in (0..self.children[v].len()).rev() {
            let w = self.children[v][index];
            self.z[w] += shift;
            self.m[w] += shift;
            change += self.c[w];
            shift += self.s[w] + change;
        }
    }

    fn apportion(&mut self, v: usize, left: Option<usize>, mut fallback: usize) -> usize {
        let Some(w) = left else {
            return fallback;
        };
        let mut vip = v;
        let mut vop = v;
        let mut vim = w;
        let mut vom = self.children[self.parent[v]][0];
        let mut sip = self.m[vip];
        let mut sop = self.m[vop];
        let mut sim = self.m[vim];
        let mut som = self.m[vom];

        let (mut next_im, mut next_ip) = (self.next_right(vim), self.next_left(vip));
        while let (Some(im), Some(ip)) = (next_im, next_ip) {
            vim = im;
            vip = ip;
            let (Some(om), Some(op)) = (self.next_left(vom), self.next_right(vop)) else {
                break;
            };
            vom = om;
            vop = op;
            self.ancestor[vop] = v;
            let shift = self.z[vim] + sim - self.z[vip] - sip + (self.separation)(vim, vip);
            if shift > 0.0 {
                let from = self.next_ancestor(vim, v, fallback);
                self.move_subtree(from, v, shift);
                sip += shift;
                sop += shift;
            }
            sim += self.m[vim];
            sip += self.m[vip];
            som += self.m[vom];
            sop += self.m[vop];
            next_im = self.next_right(vim);
            next_ip = self.next_left(vip);
        }

        if let Some(im) = next_im
            && self.next_right(vop).is_none()
        {
            self.thread[vop] = Some(im);
            self.m[vop] += sim - sop;
        }
        if let Some(ip) = next_ip
            && self.next_left(vom).is_none()
        {
            self.thread[vom] = Some(ip);
            self.m[vom] += sip - som;
            fallback = v;
        }
        fallback
    }
}
